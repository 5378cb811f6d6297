//! LP engine adapter (model description, outcomes, method hints).
//!
//! Purpose
//! - Give the rest of the crate one narrow surface over the external LP
//!   engine: describe a model, solve it, mutate variable bounds, re-solve.
//! - Keep engine types (`microlp::*`) out of every other module.
//!
//! Why this design
//! - `LpModel` is plain data, so polytopes can build baseline and auxiliary
//!   models without touching the engine.
//! - `LpSession` owns the engine state. `Method::Dual` keeps the engine's
//!   live solution and applies bound changes as fix/unfix operations;
//!   `Method::Primal` rebuilds per solve. Both return the same `LpOutcome`.
//!
//! Conventions
//! - Always minimization. Unbounded bounds use `f64::INFINITY`.

mod session;

pub use session::LpSession;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AugmentError;

/// Bounds and objective coefficient of one model variable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VarSpec {
    pub cost: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Relation between a row's left-hand side and its right-hand side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOp {
    Eq,
    Le,
    Ge,
}

/// Sparse linear row `Σ a_j x_j (op) rhs`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearRow {
    pub terms: Vec<(usize, f64)>,
    pub op: RowOp,
    pub rhs: f64,
}

/// Engine-independent LP description (minimization).
#[derive(Clone, Debug, Default)]
pub struct LpModel {
    pub vars: Vec<VarSpec>,
    pub rows: Vec<LinearRow>,
}

impl LpModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a variable and return its index.
    pub fn add_var(&mut self, cost: f64, lower: f64, upper: f64) -> usize {
        self.vars.push(VarSpec { cost, lower, upper });
        self.vars.len() - 1
    }

    /// Append a row; zero coefficients are dropped.
    pub fn add_row(&mut self, terms: impl IntoIterator<Item = (usize, f64)>, op: RowOp, rhs: f64) {
        let terms = terms.into_iter().filter(|&(_, a)| a != 0.0).collect();
        self.rows.push(LinearRow { terms, op, rhs });
    }

    #[inline]
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Terminal status reported by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error(String),
}

impl fmt::Display for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::Error(msg) => write!(f, "error ({msg})"),
        }
    }
}

impl From<microlp::Error> for LpStatus {
    fn from(err: microlp::Error) -> Self {
        match err {
            microlp::Error::Infeasible => Self::Infeasible,
            microlp::Error::Unbounded => Self::Unbounded,
            microlp::Error::InternalError(msg) => Self::Error(msg),
        }
    }
}

/// Result of one `LpSession::solve`.
#[derive(Clone, Debug)]
pub struct LpOutcome {
    pub status: LpStatus,
    /// Variable values; empty unless `status == Optimal`.
    pub values: Vec<f64>,
    /// Objective value; NaN unless `status == Optimal`.
    pub objective: f64,
    /// Simplex pivots, when the engine reports them (microlp does not).
    pub iterations: Option<usize>,
    /// Fix/unfix operations applied to the live solution for this solve.
    pub bound_updates: usize,
    pub wall_time: Duration,
}

impl LpOutcome {
    #[inline]
    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }

    /// Turn a non-optimal outcome into `SolverFailure`.
    pub fn require_optimal(self, context: &'static str) -> Result<Self, AugmentError> {
        if self.is_optimal() {
            Ok(self)
        } else {
            Err(AugmentError::solver(context, self.status))
        }
    }
}

/// Algorithm hint for re-solves.
///
/// The engine exposes a primal simplex for fresh solves and a dual simplex
/// for re-optimizing after bound restrictions; the hint picks between a full
/// rebuild and the incremental path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Method {
    /// Rebuild and solve from scratch every time.
    Primal,
    /// Keep the live solution; re-optimize after fix/unfix.
    #[default]
    Dual,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primal => "primal_simplex",
            Self::Dual => "dual_simplex",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AugmentError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "primal_simplex" | "primal" => Ok(Self::Primal),
            "dual_simplex" | "dual" | "auto" => Ok(Self::Dual),
            other => Err(AugmentError::invalid(format!(
                "unsupported LP method '{other}' (expected primal_simplex, dual_simplex or auto)"
            ))),
        }
    }
}
