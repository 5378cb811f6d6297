//! Steepest-descent direction LP.
//!
//! Given the active rows `I` at the current point, solve
//!
//! ```text
//! min  c·g
//! s.t. B g - y_pos + y_neg = 0
//!      Σ (y_pos + y_neg)   = 1
//!      A g                 = 0
//!      0 <= y_pos_i <= [i ∉ I],  0 <= y_neg_i <= 1,  g free
//! ```
//!
//! The optimum is a circuit of `P` normalized by `||Bg||_1 = 1`; its value
//! (the steepness) is non-positive and zero exactly at an optimal point.
//!
//! Precondition: `P` is pointed, i.e. `{g : Ag = 0, Bg = 0} = {0}`. Without
//! inequality rows the normalization row is infeasible, and a lineality
//! direction with `c·g != 0` makes the LP unbounded; both surface as
//! `AugmentError::SolverFailure` from `compute_direction`.
//!
//! Variable layout: `g_j = j`, `y_pos_i = n + 2i`, `y_neg_i = n + 2i + 1`.
//! Only `y_pos` bounds change between solves, so `Method::Dual` keeps the
//! engine's live solution and applies them as fix/unfix updates.

use std::time::Duration;

use nalgebra::DVector;

use crate::circuit::Circuit;
use crate::error::AugmentError;
use crate::lp::{LpModel, LpSession, Method, RowOp};
use crate::polyhedron::{ActiveSet, LinearSystem};

/// One direction solve.
#[derive(Clone, Debug)]
pub struct DirectionSolve {
    pub circuit: Circuit,
    /// Simplex pivots, when the engine reports them.
    pub iterations: Option<usize>,
    pub solve_time: Duration,
    pub bound_updates: usize,
}

/// Auxiliary LP owned by the driver for the whole run.
#[derive(Debug)]
pub struct DirectionSubproblem {
    session: LpSession,
    n: usize,
    m: usize,
}

impl DirectionSubproblem {
    /// Build the LP for `system` (which must carry an objective) with `active`
    /// rows blocked.
    pub fn new(
        system: &LinearSystem,
        active: &ActiveSet,
        method: Method,
    ) -> Result<Self, AugmentError> {
        let cost = system.require_cost()?;
        let n = system.dim();
        let m = system.num_ineq();
        if active.num_rows() != m {
            return Err(AugmentError::dimension(format!(
                "active set covers {} rows but B has {m}",
                active.num_rows()
            )));
        }

        let mut model = LpModel::new();
        for j in 0..n {
            model.add_var(cost[j], f64::NEG_INFINITY, f64::INFINITY);
        }
        for _ in 0..m {
            model.add_var(0.0, 0.0, 1.0);
            model.add_var(0.0, 0.0, 1.0);
        }

        let b = system.ineq_lhs();
        for i in 0..m {
            let row = b.row(i);
            let terms = (0..n)
                .map(|j| (j, row[j]))
                .chain([(pos_var(n, i), -1.0), (neg_var(n, i), 1.0)]);
            model.add_row(terms, RowOp::Eq, 0.0);
        }
        model.add_row(
            (0..m).flat_map(|i| [(pos_var(n, i), 1.0), (neg_var(n, i), 1.0)]),
            RowOp::Eq,
            1.0,
        );
        let a = system.eq_lhs();
        for r in 0..system.num_eq() {
            let row = a.row(r);
            model.add_row((0..n).map(|j| (j, row[j])), RowOp::Eq, 0.0);
        }

        let mut sub = Self {
            session: LpSession::new(model, method),
            n,
            m,
        };
        sub.set_active_rows(active);
        Ok(sub)
    }

    /// Block `y_pos_i` for every active row, release it for the rest.
    pub fn set_active_rows(&mut self, active: &ActiveSet) {
        for i in 0..self.m {
            let v = pos_var(self.n, i);
            if active.contains(i) {
                self.session.set_bounds(v, 0.0, 0.0);
            } else {
                self.session.reset_bounds(v);
            }
        }
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.session.method()
    }

    pub fn set_method(&mut self, method: Method) {
        self.session.set_method(method);
    }

    /// Parse and apply a method hint (`primal_simplex`, `dual_simplex`, `auto`).
    pub fn select_method(&mut self, name: &str) -> Result<(), AugmentError> {
        self.set_method(name.parse()?);
        Ok(())
    }

    /// Solve for the steepest circuit at the current active set.
    pub fn compute_direction(&mut self, verbose: bool) -> Result<DirectionSolve, AugmentError> {
        let out = self
            .session
            .solve()
            .require_optimal("steepest-descent direction")?;
        if verbose {
            tracing::info!(
                steepness = out.objective,
                secs = out.wall_time.as_secs_f64(),
                bound_updates = out.bound_updates,
                "direction lp"
            );
        } else {
            tracing::trace!(steepness = out.objective, "direction lp");
        }

        let (n, m) = (self.n, self.m);
        let g = DVector::from_iterator(n, out.values[..n].iter().copied());
        let y_pos = DVector::from_fn(m, |i, _| out.values[pos_var(n, i)]);
        let y_neg = DVector::from_fn(m, |i, _| out.values[neg_var(n, i)]);
        Ok(DirectionSolve {
            circuit: Circuit {
                g,
                y_pos,
                y_neg,
                steepness: out.objective,
            },
            iterations: out.iterations,
            solve_time: out.wall_time,
            bound_updates: out.bound_updates,
        })
    }

    /// Seed the engine with a known direction: fix `g` to `direction` with
    /// every `y_pos` released, solve once, then restore the previous bounds.
    /// A failed seed solve is ignored.
    pub fn warm_start(&mut self, direction: &DVector<f64>, active: &ActiveSet) {
        if direction.len() != self.n {
            tracing::debug!(
                len = direction.len(),
                n = self.n,
                "warm start skipped: wrong length"
            );
            return;
        }
        for i in 0..self.m {
            self.session.reset_bounds(pos_var(self.n, i));
        }
        for (j, &v) in direction.iter().enumerate() {
            self.session.set_bounds(j, v, v);
        }
        let seed = self.session.solve();
        if !seed.is_optimal() {
            tracing::debug!(status = %seed.status, "warm start solve failed");
        }
        for j in 0..self.n {
            self.session.reset_bounds(j);
        }
        self.set_active_rows(active);
    }
}

#[inline]
fn pos_var(n: usize, row: usize) -> usize {
    n + 2 * row
}

#[inline]
fn neg_var(n: usize, row: usize) -> usize {
    n + 2 * row + 1
}
