//! Polytopes that circuit augmentation can walk on.
//!
//! Purpose
//! - Describe `P = {x : Ax = b, Bx <= d}` and the per-iterate bookkeeping
//!   (active rows, cached products) the driver threads through a run.
//! - Define the `CircuitPolytope` capability set: activity detection, ratio
//!   test, maximal step. Structured variants override these with closed
//!   forms; the generic `Polyhedron` implements them with dense algebra.
//!
//! Why this design
//! - States are values (`PolyhedronState`), not mutable polytope fields: a
//!   step returns a new state, so a polytope can be shared by several runs
//!   and tests can replay a step from any state.
//! - One tolerance per polytope (`eps()`), used for activity, rates, ties
//!   and degenerate steps alike.
//!
//! Conventions
//! - Row `i` of `B` is active at `x` iff `d_i - (Bx)_i <= eps`.
//! - A step with `alpha < eps` is degenerate: the point stays, every
//!   previously active row stays active, and the blocking rows join.

mod general;
mod state;
mod system;

pub use general::Polyhedron;
pub use state::{ActiveSet, PolyhedronState};
pub use system::LinearSystem;

use std::fmt;

use nalgebra::DVector;

use crate::circuit::Circuit;
use crate::error::AugmentError;
use crate::lp::{LpModel, LpOutcome, LpSession, Method};

/// Ratio-test result: largest feasible step and the rows attaining it.
#[derive(Clone, Debug, PartialEq)]
pub struct StepBound {
    /// `f64::INFINITY` when no row blocks the direction.
    pub alpha: f64,
    /// Rows within `eps` of the minimal ratio, ordered by ratio then index.
    pub blocking: Vec<usize>,
}

impl StepBound {
    pub fn unbounded() -> Self {
        Self {
            alpha: f64::INFINITY,
            blocking: Vec::new(),
        }
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.alpha.is_infinite()
    }

    /// Row attaining the minimal ratio.
    #[inline]
    pub fn blocking_index(&self) -> Option<usize> {
        self.blocking.first().copied()
    }

    /// Minimal ratio over `(row, ratio)` candidates, keeping every row whose
    /// ratio is within `eps` of it.
    pub fn from_ratios(candidates: impl IntoIterator<Item = (usize, f64)>, eps: f64) -> Self {
        let mut ratios: Vec<(usize, f64)> = candidates.into_iter().collect();
        let Some(alpha) = ratios.iter().map(|&(_, r)| r).reduce(f64::min) else {
            return Self::unbounded();
        };
        ratios.retain(|&(_, r)| r <= alpha + eps);
        ratios.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        Self {
            alpha,
            blocking: ratios.into_iter().map(|(i, _)| i).collect(),
        }
    }
}

/// Result of `take_maximal_step`.
#[derive(Clone, Debug)]
pub struct StepOutcome<C> {
    pub state: PolyhedronState<C>,
    /// Step length actually taken (0 for degenerate, infinite for unbounded).
    pub alpha: f64,
    pub blocking: Vec<usize>,
    pub degenerate: bool,
}

impl<C> StepOutcome<C> {
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.alpha.is_infinite()
    }
}

/// Capability set required by the augmentation driver.
pub trait CircuitPolytope {
    /// Variant bookkeeping carried in `PolyhedronState::cache`.
    type Cache: Clone + fmt::Debug;

    fn system(&self) -> &LinearSystem;

    fn eps(&self) -> f64;

    /// Some point of `P`. The default solves the zero-objective LP.
    fn find_feasible_solution(&self) -> Result<DVector<f64>, AugmentError> {
        let out = LpSession::new(self.build_lp_model(None), Method::Primal)
            .solve()
            .require_optimal("feasibility search")?;
        Ok(DVector::from_vec(out.values))
    }

    /// State at `x`: active rows plus freshly computed cache.
    fn get_active_constraints(&self, x: &DVector<f64>) -> PolyhedronState<Self::Cache>;

    /// Ratio test along `g` over the inactive rows with positive rate.
    /// `rates` may pass a precomputed `Bg`.
    fn get_max_step_size(
        &self,
        state: &PolyhedronState<Self::Cache>,
        g: &DVector<f64>,
        rates: Option<&DVector<f64>>,
    ) -> StepBound;

    /// Move maximally along `circuit` and return the new state.
    fn take_maximal_step(
        &self,
        state: &PolyhedronState<Self::Cache>,
        circuit: &Circuit,
    ) -> Result<StepOutcome<Self::Cache>, AugmentError>;

    /// LP over `P` with the given objective (`None` for feasibility).
    fn build_lp_model(&self, cost: Option<&DVector<f64>>) -> LpModel {
        self.system().lp_model(cost)
    }

    /// Baseline LP `min c·x` over `P`. Non-optimal statuses are returned in
    /// the outcome; only a missing objective is an error.
    fn solve_lp(&self, method: Method) -> Result<LpOutcome, AugmentError> {
        let cost = self.system().require_cost()?;
        Ok(LpSession::new(self.build_lp_model(Some(cost)), method).solve())
    }

    fn check_feasible(&self, x: &DVector<f64>) -> Result<(), AugmentError> {
        self.system().check_feasible(x, self.eps())
    }
}
