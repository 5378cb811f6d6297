//! Stateful LP session over `microlp`.

use std::time::Instant;

use microlp::{ComparisonOp, OptimizationDirection, Problem, Solution, Variable};

use super::{LpModel, LpOutcome, LpStatus, Method, RowOp};

/// Engine solution kept alive between solves (`Method::Dual`).
///
/// `fixed[v]` mirrors the fixes applied to `solution` on top of the
/// construction bounds.
struct Live {
    solution: Solution,
    vars: Vec<Variable>,
    fixed: Vec<Option<f64>>,
}

/// LP model plus engine state; supports bound mutation and re-solve.
pub struct LpSession {
    model: LpModel,
    base_bounds: Vec<(f64, f64)>,
    method: Method,
    live: Option<Live>,
}

impl std::fmt::Debug for LpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LpSession")
            .field("num_vars", &self.model.num_vars())
            .field("num_rows", &self.model.num_rows())
            .field("method", &self.method)
            .field("live", &self.live.is_some())
            .finish()
    }
}

impl LpSession {
    pub fn new(model: LpModel, method: Method) -> Self {
        let base_bounds = model.vars.iter().map(|v| (v.lower, v.upper)).collect();
        Self {
            model,
            base_bounds,
            method,
            live: None,
        }
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        if method == Method::Primal {
            self.live = None;
        }
        self.method = method;
    }

    #[inline]
    pub fn bounds(&self, var: usize) -> (f64, f64) {
        let v = &self.model.vars[var];
        (v.lower, v.upper)
    }

    /// Change the bounds of `var` for subsequent solves.
    pub fn set_bounds(&mut self, var: usize, lower: f64, upper: f64) {
        let v = &mut self.model.vars[var];
        v.lower = lower;
        v.upper = upper;
    }

    /// Restore the bounds `var` had when the session was created.
    pub fn reset_bounds(&mut self, var: usize) {
        let (lower, upper) = self.base_bounds[var];
        self.set_bounds(var, lower, upper);
    }

    pub fn solve(&mut self) -> LpOutcome {
        let started = Instant::now();
        let (result, bound_updates) = match self.method {
            Method::Primal => (self.solve_rebuilt(), 0),
            Method::Dual => match self.solve_incremental() {
                Ok((values, objective, updates)) => (Ok((values, objective)), updates),
                Err(reason) => {
                    tracing::debug!(reason, "incremental re-solve unavailable, rebuilding");
                    self.live = None;
                    (self.solve_rebuilt(), 0)
                }
            },
        };
        let wall_time = started.elapsed();
        match result {
            Ok((values, objective)) => LpOutcome {
                status: LpStatus::Optimal,
                values,
                objective,
                iterations: None,
                bound_updates,
                wall_time,
            },
            Err(err) => LpOutcome {
                status: err.into(),
                values: Vec::new(),
                objective: f64::NAN,
                iterations: None,
                bound_updates,
                wall_time,
            },
        }
    }

    fn build_problem(&self, bounds: &[(f64, f64)]) -> (Problem, Vec<Variable>) {
        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<Variable> = self
            .model
            .vars
            .iter()
            .zip(bounds)
            .map(|(spec, &(lo, hi))| problem.add_var(spec.cost, (lo, hi)))
            .collect();
        for row in &self.model.rows {
            let op = match row.op {
                RowOp::Eq => ComparisonOp::Eq,
                RowOp::Le => ComparisonOp::Le,
                RowOp::Ge => ComparisonOp::Ge,
            };
            problem.add_constraint(row.terms.iter().map(|&(j, a)| (vars[j], a)), op, row.rhs);
        }
        (problem, vars)
    }

    fn current_bounds(&self) -> Vec<(f64, f64)> {
        self.model.vars.iter().map(|v| (v.lower, v.upper)).collect()
    }

    fn solve_rebuilt(&self) -> Result<(Vec<f64>, f64), microlp::Error> {
        let (problem, vars) = self.build_problem(&self.current_bounds());
        let solution = problem.solve()?;
        Ok(read_solution(&solution, &vars))
    }

    /// Re-solve on the live solution. `Err` carries the reason a rebuild is
    /// needed; the rebuild then reports the authoritative status.
    fn solve_incremental(&mut self) -> Result<(Vec<f64>, f64, usize), &'static str> {
        let mut targets = Vec::with_capacity(self.model.num_vars());
        for (v, spec) in self.model.vars.iter().enumerate() {
            if (spec.lower, spec.upper) == self.base_bounds[v] {
                targets.push(None);
            } else if spec.lower == spec.upper {
                targets.push(Some(spec.lower));
            } else {
                return Err("bound change is not a fix");
            }
        }

        let mut live = match self.live.take() {
            Some(live) => live,
            None => {
                let (problem, vars) = self.build_problem(&self.base_bounds);
                let solution = problem.solve().map_err(|_| "base model has no optimum")?;
                let fixed = vec![None; vars.len()];
                Live {
                    solution,
                    vars,
                    fixed,
                }
            }
        };

        let mut updates = 0;
        // Relax first, then restrict: every intermediate model lies between the
        // (bounded) base model and the target.
        for v in 0..targets.len() {
            if live.fixed[v].is_some() && live.fixed[v] != targets[v] {
                let (solution, was_fixed) = live.solution.unfix_var(live.vars[v]);
                if !was_fixed {
                    return Err("engine lost track of a fixed variable");
                }
                live.solution = solution;
                live.fixed[v] = None;
                updates += 1;
            }
        }
        for v in 0..targets.len() {
            let Some(val) = targets[v] else {
                continue;
            };
            if live.fixed[v] == Some(val) {
                continue;
            }
            live.solution = live
                .solution
                .fix_var(live.vars[v], val)
                .map_err(|_| "fixing a variable made the live model infeasible")?;
            live.fixed[v] = Some(val);
            updates += 1;
        }

        let (values, objective) = read_solution(&live.solution, &live.vars);
        self.live = Some(live);
        Ok((values, objective, updates))
    }
}

fn read_solution(solution: &Solution, vars: &[Variable]) -> (Vec<f64>, f64) {
    let values = vars.iter().map(|&v| *solution.var_value(v)).collect();
    (values, solution.objective())
}
