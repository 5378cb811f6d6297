//! Steepest-descent circuit augmentation.
//!
//! Purpose
//! - Solve `min c·x` over a `CircuitPolytope` by repeatedly moving maximally
//!   along the steepest improving circuit until none exists.
//!
//! Why this design
//! - The driver owns the only mutable state (current `PolyhedronState` and
//!   the `DirectionSubproblem`); polytopes are borrowed immutably, so one
//!   polytope can back several runs with different starts or methods.
//! - Unbounded, timeout and degenerate steps are outcomes recorded on the
//!   result; only construction and solver failures are errors.
//!
//! Conventions
//! - `steepness >= -eps` stops with `Optimal`.
//! - Degenerate steps never shrink the active set, so a streak of them is at
//!   most `m_B` long before the point moves or the run stops.
//! - The wall-clock budget is checked once per outer iteration.
//! - `P` must be pointed (see `subproblem`); otherwise the first direction
//!   solve fails with `SolverFailure`.

mod record;

pub use record::{AugmentResult, IterationRecord, Status};

use std::time::{Duration, Instant};

use nalgebra::DVector;

use crate::cfg::AugmentCfg;
use crate::error::AugmentError;
use crate::polyhedron::{CircuitPolytope, PolyhedronState};
use crate::subproblem::DirectionSubproblem;

/// Run augmentation from `x0` with `cfg`.
pub fn steepest_descent<P: CircuitPolytope>(
    poly: &P,
    x0: &DVector<f64>,
    cfg: AugmentCfg,
) -> Result<AugmentResult, AugmentError> {
    AugmentationDriver::new(poly, cfg).run(x0)
}

/// Convenience: start from `find_feasible_solution` with default settings.
pub fn solve_with_defaults<P: CircuitPolytope>(poly: &P) -> Result<AugmentResult, AugmentError> {
    let x0 = poly.find_feasible_solution()?;
    steepest_descent(poly, &x0, AugmentCfg::default())
}

/// Augmentation runner bound to one polytope.
#[derive(Debug)]
pub struct AugmentationDriver<'p, P> {
    poly: &'p P,
    cfg: AugmentCfg,
}

impl<'p, P: CircuitPolytope> AugmentationDriver<'p, P> {
    pub fn new(poly: &'p P, cfg: AugmentCfg) -> Self {
        Self { poly, cfg }
    }

    #[inline]
    pub fn cfg(&self) -> &AugmentCfg {
        &self.cfg
    }

    /// Like `run`, but failures become a `Status::Error` record at `x0`.
    pub fn run_recorded(&self, x0: &DVector<f64>) -> AugmentResult {
        let started = Instant::now();
        match self.run(x0) {
            Ok(res) => res,
            Err(err) => {
                tracing::warn!(error = %err, "augmentation failed");
                AugmentResult {
                    status: Status::Error(err.to_string()),
                    point: x0.clone(),
                    objective: f64::NAN,
                    certificate: None,
                    trace: Vec::new(),
                    build_time: Duration::ZERO,
                    total_time: started.elapsed(),
                }
            }
        }
    }

    pub fn run(&self, x0: &DVector<f64>) -> Result<AugmentResult, AugmentError> {
        let started = Instant::now();
        let poly = self.poly;
        let system = poly.system();
        let eps = poly.eps();

        // BUILD
        system.require_cost()?;
        poly.check_feasible(x0)?;
        let mut state = poly.get_active_constraints(x0);
        let mut sub = DirectionSubproblem::new(system, &state.active, self.cfg.method)?;
        let build_time = started.elapsed();
        tracing::info!(
            n = system.dim(),
            m_ineq = system.num_ineq(),
            m_eq = system.num_eq(),
            active = state.active.count(),
            method = %self.cfg.method,
            build_secs = build_time.as_secs_f64(),
            "build"
        );

        // ITERATE
        let mut trace: Vec<IterationRecord> = Vec::new();
        let mut streak = 0usize;
        loop {
            if let Some(limit) = self.cfg.max_time {
                if started.elapsed() >= limit {
                    tracing::warn!(iterations = trace.len(), ?limit, "time budget exhausted");
                    return Ok(self.finish(Status::Timeout, state, None, trace, build_time, started));
                }
            }

            let sol = sub.compute_direction(self.cfg.verbose)?;
            let circuit = sol.circuit;
            if circuit.steepness >= -eps {
                let res = self.finish(Status::Optimal, state, None, trace, build_time, started);
                tracing::info!(
                    objective = res.objective,
                    iterations = res.iterations(),
                    degenerate = res.degenerate_steps(),
                    "optimal"
                );
                return Ok(res);
            }

            let step_started = Instant::now();
            let step = poly.take_maximal_step(&state, &circuit)?;
            let step_time = step_started.elapsed();
            let index = trace.len();

            if step.is_unbounded() {
                trace.push(IterationRecord {
                    index,
                    circuit: circuit.g.clone(),
                    steepness: circuit.steepness,
                    step: f64::INFINITY,
                    objective: system.objective_value(&state.point),
                    degenerate: false,
                    active_count: state.active.count(),
                    lp_time: sol.solve_time,
                    step_time,
                    lp_iterations: sol.iterations,
                    bound_updates: sol.bound_updates,
                });
                tracing::info!(iterations = trace.len(), steepness = circuit.steepness, "unbounded");
                let ray = circuit.g;
                return Ok(self.finish(
                    Status::Unbounded,
                    state,
                    Some(ray),
                    trace,
                    build_time,
                    started,
                ));
            }

            streak = if step.degenerate { streak + 1 } else { 0 };
            let objective = system.objective_value(&step.state.point);
            let record = IterationRecord {
                index,
                circuit: circuit.g,
                steepness: circuit.steepness,
                step: step.alpha,
                objective,
                degenerate: step.degenerate,
                active_count: step.state.active.count(),
                lp_time: sol.solve_time,
                step_time,
                lp_iterations: sol.iterations,
                bound_updates: sol.bound_updates,
            };
            tracing::debug!(
                iter = index,
                steepness = record.steepness,
                alpha = record.step,
                objective,
                blocking = ?step.blocking,
                degenerate = step.degenerate,
                "step"
            );
            if self.cfg.log_every > 0 && index % self.cfg.log_every == 0 {
                tracing::info!(
                    iter = index,
                    alpha = record.step,
                    steepness = record.steepness,
                    objective,
                    streak,
                    "progress"
                );
            }
            trace.push(record);

            state = step.state;
            sub.set_active_rows(&state.active);
        }
    }

    fn finish(
        &self,
        status: Status,
        state: PolyhedronState<P::Cache>,
        certificate: Option<DVector<f64>>,
        trace: Vec<IterationRecord>,
        build_time: Duration,
        started: Instant,
    ) -> AugmentResult {
        let objective = self.poly.system().objective_value(&state.point);
        AugmentResult {
            status,
            point: state.point,
            objective,
            certificate,
            trace,
            build_time,
            total_time: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests;
