//! Random spindles: two pointed cones with apexes `p1 = 0` and `p2 = 1`.
//!
//! Facets come in three groups, in row order:
//! - `n_cone` rows tight at `p1` that `p2` satisfies strictly (entries in
//!   `[-100, 25)`),
//! - `n_cone` rows tight at `p2` that `p1` satisfies strictly (entries in
//!   `[-25, 100)`),
//! - `n_parallel` pairs of parallel rows through a random 0/1 point and its
//!   complement, satisfied strictly by both apexes (entries in `[-10, 10)`).
//!
//! With `n_cone > n` the apex `p1` is a degenerate vertex, which makes these
//! instances a stress test for degenerate steps. The objective is `p1 - p2`.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::circuit::Circuit;
use crate::error::AugmentError;
use crate::polyhedron::{
    ActiveSet, CircuitPolytope, LinearSystem, Polyhedron, PolyhedronState, StepBound, StepOutcome,
};

/// Rejection-sampling attempts per facet.
const MAX_DRAWS: usize = 10_000;

#[derive(Clone, Debug)]
pub struct Spindle {
    inner: Polyhedron,
    n_cone: usize,
    n_parallel: usize,
    seed: u64,
}

impl Spindle {
    pub fn new(n: usize, n_cone: usize, n_parallel: usize, seed: u64) -> Result<Self, AugmentError> {
        if n == 0 || n_cone == 0 {
            return Err(AugmentError::invalid(
                "spindle needs a positive dimension and at least one cone facet",
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows: Vec<Vec<i64>> = Vec::with_capacity(2 * n_cone + 2 * n_parallel);
        let mut rhs: Vec<i64> = Vec::with_capacity(rows.capacity());

        for _ in 0..n_cone {
            // Tight at p1 (rhs 0); p2 satisfies it strictly iff sum(row) < 0.
            let row = draw(&mut rng, n, -100..25, |row| row.iter().sum::<i64>() < 0)?;
            rows.push(row);
            rhs.push(0);
        }
        for _ in 0..n_cone {
            // Tight at p2 (rhs = sum); p1 satisfies it strictly iff sum > 0.
            let row = draw(&mut rng, n, -25..100, |row| row.iter().sum::<i64>() > 0)?;
            rhs.push(row.iter().sum());
            rows.push(row);
        }
        for _ in 0..n_parallel {
            let (row, point) = draw_parallel(&mut rng, n)?;
            let level: i64 = row.iter().zip(&point).map(|(a, p)| a * p).sum();
            let sum: i64 = row.iter().sum();
            let mirrored: Vec<i64> = row.iter().map(|a| -a).collect();
            rows.push(row);
            rhs.push(level);
            // Mirror through the complement: -row·x <= -row·(1 - point).
            rows.push(mirrored);
            rhs.push(level - sum);
        }

        let m = rows.len();
        let flat: Vec<f64> = rows.iter().flatten().map(|&v| v as f64).collect();
        let d = DVector::from_iterator(m, rhs.iter().map(|&v| v as f64));
        let system = LinearSystem::new(DMatrix::from_row_slice(m, n, &flat), d)?
            .with_cost(DVector::from_element(n, -1.0))?;
        tracing::debug!(n, n_cone, n_parallel, seed, rows = m, "spindle");
        Ok(Self {
            inner: Polyhedron::new(system),
            n_cone,
            n_parallel,
            seed,
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.inner.system().dim()
    }

    #[inline]
    pub fn n_cone_facets(&self) -> usize {
        self.n_cone
    }

    #[inline]
    pub fn n_parallel_facets(&self) -> usize {
        self.n_parallel
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// `(p1, p2)`.
    pub fn apexes(&self) -> (DVector<f64>, DVector<f64>) {
        let n = self.dim();
        (DVector::zeros(n), DVector::from_element(n, 1.0))
    }

    pub fn inner(&self) -> &Polyhedron {
        &self.inner
    }
}

fn draw(
    rng: &mut StdRng,
    n: usize,
    range: std::ops::Range<i64>,
    accept: impl Fn(&[i64]) -> bool,
) -> Result<Vec<i64>, AugmentError> {
    for _ in 0..MAX_DRAWS {
        let row: Vec<i64> = (0..n).map(|_| rng.gen_range(range.clone())).collect();
        if accept(&row) {
            return Ok(row);
        }
    }
    Err(AugmentError::invalid(format!(
        "no acceptable facet in [{}, {}) after {MAX_DRAWS} draws",
        range.start, range.end
    )))
}

/// Row and 0/1 point with `0 < row·point` and `sum(row) < row·point`.
fn draw_parallel(rng: &mut StdRng, n: usize) -> Result<(Vec<i64>, Vec<i64>), AugmentError> {
    for _ in 0..MAX_DRAWS {
        let row: Vec<i64> = (0..n).map(|_| rng.gen_range(-10..10)).collect();
        let point: Vec<i64> = (0..n).map(|_| rng.gen_range(0..2)).collect();
        let level: i64 = row.iter().zip(&point).map(|(a, p)| a * p).sum();
        if level > 0 && row.iter().sum::<i64>() < level {
            return Ok((row, point));
        }
    }
    Err(AugmentError::invalid(format!(
        "no acceptable parallel facet pair after {MAX_DRAWS} draws"
    )))
}

impl CircuitPolytope for Spindle {
    type Cache = DVector<f64>;

    #[inline]
    fn system(&self) -> &LinearSystem {
        self.inner.system()
    }

    #[inline]
    fn eps(&self) -> f64 {
        self.inner.eps()
    }

    /// The apex `p1`.
    fn find_feasible_solution(&self) -> Result<DVector<f64>, AugmentError> {
        Ok(self.apexes().0)
    }

    /// At `p1` the active rows are exactly the first `n_cone` rows.
    fn get_active_constraints(&self, x: &DVector<f64>) -> PolyhedronState<DVector<f64>> {
        if x.iter().all(|&v| v == 0.0) {
            let m = self.system().num_ineq();
            PolyhedronState {
                point: x.clone(),
                active: ActiveSet::from_indices(m, 0..self.n_cone),
                cache: DVector::zeros(m),
            }
        } else {
            self.inner.get_active_constraints(x)
        }
    }

    fn get_max_step_size(
        &self,
        state: &PolyhedronState<DVector<f64>>,
        g: &DVector<f64>,
        rates: Option<&DVector<f64>>,
    ) -> StepBound {
        self.inner.get_max_step_size(state, g, rates)
    }

    fn take_maximal_step(
        &self,
        state: &PolyhedronState<DVector<f64>>,
        circuit: &Circuit,
    ) -> Result<StepOutcome<DVector<f64>>, AugmentError> {
        self.inner.take_maximal_step(state, circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::AugmentCfg;
    use crate::driver::{steepest_descent, Status};
    use crate::lp::{LpStatus, Method};

    #[test]
    fn same_seed_same_rows() {
        let a = Spindle::new(4, 5, 2, 11).unwrap();
        let b = Spindle::new(4, 5, 2, 11).unwrap();
        let c = Spindle::new(4, 5, 2, 12).unwrap();
        assert_eq!(a.system().ineq_lhs(), b.system().ineq_lhs());
        assert_eq!(a.system().ineq_rhs(), b.system().ineq_rhs());
        assert_ne!(a.system().ineq_lhs(), c.system().ineq_lhs());
        assert_eq!(a.system().num_ineq(), 2 * 5 + 2 * 2);
    }

    #[test]
    fn facets_separate_the_apexes() {
        let s = Spindle::new(5, 6, 3, 3).unwrap();
        let (p1, p2) = s.apexes();
        let sys = s.system();
        let at_p1 = sys.ineq_lhs() * &p1 - sys.ineq_rhs();
        let at_p2 = sys.ineq_lhs() * &p2 - sys.ineq_rhs();
        for i in 0..6 {
            assert_eq!(at_p1[i], 0.0);
            assert!(at_p2[i] < 0.0);
            assert_eq!(at_p2[6 + i], 0.0);
            assert!(at_p1[6 + i] < 0.0);
        }
        for i in 12..sys.num_ineq() {
            assert!(at_p1[i] < 0.0 && at_p2[i] < 0.0, "parallel row {i} touches an apex");
        }
        // Parallel pairs really are parallel.
        for pair in 0..3 {
            let r = 12 + 2 * pair;
            assert_eq!(sys.ineq_lhs().row(r), -sys.ineq_lhs().row(r + 1));
        }
        assert_eq!(sys.cost(), Some(&DVector::from_element(5, -1.0)));
    }

    #[test]
    fn apex_state_matches_generic_rule() {
        let s = Spindle::new(3, 4, 2, 5).unwrap();
        let p1 = s.find_feasible_solution().unwrap();
        s.check_feasible(&p1).unwrap();
        let st = s.get_active_constraints(&p1);
        assert_eq!(st.active.indices().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        let generic = s.inner().get_active_constraints(&p1);
        assert_eq!(generic.active, st.active);
    }

    #[test]
    fn rejects_empty_shapes() {
        assert!(matches!(
            Spindle::new(0, 3, 1, 0),
            Err(AugmentError::InvalidInput(_))
        ));
        assert!(Spindle::new(3, 0, 1, 0).is_err());
    }

    #[test]
    fn degenerate_apex_runs_agree_with_baseline() {
        for seed in 0..6 {
            let s = Spindle::new(3, 5, 2, seed).unwrap();
            let x0 = s.find_feasible_solution().unwrap();
            let res = steepest_descent(&s, &x0, AugmentCfg::default()).unwrap();
            let baseline = s.solve_lp(Method::Primal).unwrap();
            match baseline.status {
                LpStatus::Optimal => {
                    assert_eq!(res.status, Status::Optimal, "seed {seed}");
                    assert!(
                        (res.objective - baseline.objective).abs()
                            < 1e-6 * (1.0 + baseline.objective.abs()),
                        "seed {seed}: {} vs {}",
                        res.objective,
                        baseline.objective
                    );
                }
                LpStatus::Unbounded => assert_eq!(res.status, Status::Unbounded, "seed {seed}"),
                other => panic!("seed {seed}: unexpected baseline status {other}"),
            }
            assert!(res.longest_degenerate_streak() <= s.system().num_ineq());
        }
    }
}
