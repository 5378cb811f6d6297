//! Bounded-size partition polytopes.
//!
//! `n_items` items are assigned to `k` clusters with `lower_i <= |C_i| <= upper_i`.
//! Variable `y[i * n_items + j]` is 1 iff item `j` sits in cluster `i`.
//!
//! Rows:
//! - `A`: one assignment row per item, then one size row per fixed cluster
//!   (`lower == upper`).
//! - `B`: per bounded cluster an upper row (`2t`) and a negated lower row
//!   (`2t + 1`), where `t` counts bounded clusters; then `-y_v <= 0` for every
//!   variable.
//!
//! Vertices are 0/1 and every circuit moves items along a path or cycle of
//! clusters, so from 0/1 points steps are taken in integer units with cluster
//! sizes kept as counters. Fractional points (a caller-supplied start inside
//! the relaxation) use the generic slack rules until a 0/1 point is reached.

use nalgebra::{DMatrix, DVector};

use crate::cfg::INTEGRALITY_EPS;
use crate::circuit::Circuit;
use crate::error::AugmentError;
use crate::polyhedron::{
    ActiveSet, CircuitPolytope, LinearSystem, Polyhedron, PolyhedronState, StepBound, StepOutcome,
};

#[derive(Clone, Debug)]
pub struct PartitionPolytope {
    inner: Polyhedron,
    n_items: usize,
    lower: Vec<usize>,
    upper: Vec<usize>,
    /// Clusters with `lower < upper`, in row order.
    bounded: Vec<usize>,
}

impl PartitionPolytope {
    pub fn new(n_items: usize, lower: Vec<usize>, upper: Vec<usize>) -> Result<Self, AugmentError> {
        let k = lower.len();
        if k == 0 || upper.len() != k {
            return Err(AugmentError::invalid(format!(
                "need one (lower, upper) pair per cluster, got {} and {}",
                lower.len(),
                upper.len()
            )));
        }
        if n_items == 0 {
            return Err(AugmentError::invalid("partition needs at least one item"));
        }
        if let Some(i) = (0..k).find(|&i| lower[i] > upper[i]) {
            return Err(AugmentError::invalid(format!(
                "cluster {i} has lower bound {} above upper bound {}",
                lower[i], upper[i]
            )));
        }

        let nv = n_items * k;
        let bounded: Vec<usize> = (0..k).filter(|&i| lower[i] < upper[i]).collect();
        let fixed: Vec<usize> = (0..k).filter(|&i| lower[i] == upper[i]).collect();

        let mut a = DMatrix::zeros(n_items + fixed.len(), nv);
        let mut b = DVector::zeros(n_items + fixed.len());
        for j in 0..n_items {
            for i in 0..k {
                a[(j, i * n_items + j)] = 1.0;
            }
            b[j] = 1.0;
        }
        for (r, &i) in fixed.iter().enumerate() {
            for j in 0..n_items {
                a[(n_items + r, i * n_items + j)] = 1.0;
            }
            b[n_items + r] = upper[i] as f64;
        }

        let m = 2 * bounded.len() + nv;
        let mut bm = DMatrix::zeros(m, nv);
        let mut d = DVector::zeros(m);
        for (t, &i) in bounded.iter().enumerate() {
            for j in 0..n_items {
                bm[(2 * t, i * n_items + j)] = 1.0;
                bm[(2 * t + 1, i * n_items + j)] = -1.0;
            }
            d[2 * t] = upper[i] as f64;
            d[2 * t + 1] = -(lower[i] as f64);
        }
        let offset = 2 * bounded.len();
        for v in 0..nv {
            bm[(offset + v, v)] = -1.0;
        }

        let system = LinearSystem::new(bm, d)?.with_equalities(a, b)?;
        Ok(Self {
            inner: Polyhedron::new(system),
            n_items,
            lower,
            upper,
            bounded,
        })
    }

    pub fn with_cost(mut self, cost: DVector<f64>) -> Result<Self, AugmentError> {
        self.inner.set_objective(cost)?;
        Ok(self)
    }

    #[inline]
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    #[inline]
    pub fn n_clusters(&self) -> usize {
        self.lower.len()
    }

    #[inline]
    pub fn num_vars(&self) -> usize {
        self.n_items * self.n_clusters()
    }

    pub fn inner(&self) -> &Polyhedron {
        &self.inner
    }

    #[inline]
    fn var(&self, cluster: usize, item: usize) -> usize {
        cluster * self.n_items + item
    }

    #[inline]
    fn nonneg_offset(&self) -> usize {
        2 * self.bounded.len()
    }

    fn cluster_sizes(&self, y: &DVector<f64>) -> Vec<i64> {
        (0..self.n_clusters())
            .map(|i| {
                (0..self.n_items)
                    .map(|j| y[self.var(i, j)].round() as i64)
                    .sum()
            })
            .collect()
    }

    /// Slack of every inequality row, read from the counters.
    fn slacks(&self, y: &DVector<f64>, sizes: &[i64]) -> DVector<f64> {
        let mut s = DVector::zeros(self.inner.system().num_ineq());
        for (t, &i) in self.bounded.iter().enumerate() {
            s[2 * t] = (self.upper[i] as i64 - sizes[i]) as f64;
            s[2 * t + 1] = (sizes[i] - self.lower[i] as i64) as f64;
        }
        let offset = self.nonneg_offset();
        for v in 0..self.num_vars() {
            s[offset + v] = y[v];
        }
        s
    }

    /// Whether every entry of `y` is 0 or 1 within `eps`.
    fn is_binary(&self, y: &DVector<f64>) -> bool {
        let eps = self.eps();
        y.iter()
            .all(|&v| (v - v.round()).abs() <= eps && (v.round() == 0.0 || v.round() == 1.0))
    }

    /// Same point and active rows with the generic `B·x` cache.
    fn generic_state(&self, state: &PolyhedronState<Vec<i64>>) -> PolyhedronState<DVector<f64>> {
        PolyhedronState {
            point: state.point.clone(),
            active: state.active.clone(),
            cache: self.inner.system().ineq_lhs() * &state.point,
        }
    }

    fn active_from_counters(&self, y: &DVector<f64>, sizes: &[i64]) -> ActiveSet {
        let mut active = ActiveSet::empty(self.inner.system().num_ineq());
        for (t, &i) in self.bounded.iter().enumerate() {
            if sizes[i] == self.upper[i] as i64 {
                active.insert(2 * t);
            } else if sizes[i] == self.lower[i] as i64 {
                active.insert(2 * t + 1);
            }
        }
        let offset = self.nonneg_offset();
        for v in 0..self.num_vars() {
            if y[v].round() == 0.0 {
                active.insert(offset + v);
            }
        }
        active
    }
}

impl CircuitPolytope for PartitionPolytope {
    /// Cluster sizes.
    type Cache = Vec<i64>;

    #[inline]
    fn system(&self) -> &LinearSystem {
        self.inner.system()
    }

    #[inline]
    fn eps(&self) -> f64 {
        self.inner.eps()
    }

    /// Greedy fill: every cluster up to its lower bound, then round-robin up
    /// to the upper bounds.
    fn find_feasible_solution(&self) -> Result<DVector<f64>, AugmentError> {
        let k = self.n_clusters();
        let min_total: usize = self.lower.iter().sum();
        let max_total: usize = self.upper.iter().sum();
        if min_total > self.n_items || max_total < self.n_items {
            return Err(AugmentError::invalid(format!(
                "{} items cannot meet cluster bounds (sum of lower {min_total}, sum of upper {max_total})",
                self.n_items
            )));
        }

        let mut y = DVector::zeros(self.num_vars());
        let mut sizes = vec![0usize; k];
        let mut next = 0;
        for i in 0..k {
            for _ in 0..self.lower[i] {
                y[self.var(i, next)] = 1.0;
                sizes[i] += 1;
                next += 1;
            }
        }
        let mut i = 0;
        let mut loops = 0;
        while next < self.n_items {
            if sizes[i] < self.upper[i] {
                y[self.var(i, next)] = 1.0;
                sizes[i] += 1;
                next += 1;
            }
            i = (i + 1) % k;
            loops += 1;
            if loops >= k * self.n_items && next < self.n_items {
                return Err(AugmentError::invalid("unable to find a feasible clustering"));
            }
        }
        tracing::debug!(sizes = ?sizes, "greedy clustering");
        Ok(y)
    }

    /// Counter rule on 0/1 points, the generic slack rule elsewhere.
    fn get_active_constraints(&self, x: &DVector<f64>) -> PolyhedronState<Vec<i64>> {
        let sizes = self.cluster_sizes(x);
        let active = if self.is_binary(x) {
            self.active_from_counters(x, &sizes)
        } else {
            self.inner.get_active_constraints(x).active
        };
        PolyhedronState {
            point: x.clone(),
            active,
            cache: sizes,
        }
    }

    fn get_max_step_size(
        &self,
        state: &PolyhedronState<Vec<i64>>,
        g: &DVector<f64>,
        rates: Option<&DVector<f64>>,
    ) -> StepBound {
        let computed;
        let rates = match rates {
            Some(r) => r,
            None => {
                computed = self.inner.system().ineq_lhs() * g;
                &computed
            }
        };
        if !self.is_binary(&state.point) {
            return self
                .inner
                .get_max_step_size(&self.generic_state(state), g, Some(rates));
        }
        let eps = self.eps();
        let slack = self.slacks(&state.point, &state.cache);
        let candidates = (0..rates.len())
            .filter(|&i| !state.active.contains(i) && rates[i] > eps)
            .map(|i| (i, slack[i].max(0.0) / rates[i]));
        StepBound::from_ratios(candidates, eps)
    }

    /// From a 0/1 point, move by the 0/±1 form of the circuit; `alpha` is
    /// reported in units of `circuit.g`. Fractional points take the generic
    /// step.
    fn take_maximal_step(
        &self,
        state: &PolyhedronState<Vec<i64>>,
        circuit: &Circuit,
    ) -> Result<StepOutcome<Vec<i64>>, AugmentError> {
        let g = &circuit.g;
        if g.len() != self.num_vars() {
            return Err(AugmentError::dimension(format!(
                "direction has length {} but the partition has {} variables",
                g.len(),
                self.num_vars()
            )));
        }
        if !self.is_binary(&state.point) {
            let out = self.inner.take_maximal_step(&self.generic_state(state), circuit)?;
            let sizes = self.cluster_sizes(&out.state.point);
            return Ok(StepOutcome {
                state: PolyhedronState {
                    point: out.state.point,
                    active: out.state.active,
                    cache: sizes,
                },
                alpha: out.alpha,
                blocking: out.blocking,
                degenerate: out.degenerate,
            });
        }
        let eps = self.eps();
        let Some(lead) = g.iter().copied().find(|&v| v > eps) else {
            return Err(AugmentError::InvalidStep(
                "circuit has no positive entry".into(),
            ));
        };
        let scale = 1.0 / lead;

        let mut point = state.point.map(f64::round);
        for (v, &gv) in g.iter().enumerate() {
            let unit = scale * gv;
            let delta = unit.round();
            if (unit - delta).abs() > INTEGRALITY_EPS {
                return Err(AugmentError::InvalidStep(format!(
                    "entry {v} of the circuit is not a 0/±1 multiple ({unit:.6})"
                )));
            }
            point[v] += delta;
            if point[v] != 0.0 && point[v] != 1.0 {
                return Err(AugmentError::InvalidStep(format!(
                    "variable {v} leaves {{0, 1}} (value {})",
                    point[v]
                )));
            }
        }

        let sizes = self.cluster_sizes(&point);
        for (i, &size) in sizes.iter().enumerate() {
            if size < self.lower[i] as i64 || size > self.upper[i] as i64 {
                return Err(AugmentError::InvalidStep(format!(
                    "cluster {i} would hold {size} items, outside [{}, {}]",
                    self.lower[i], self.upper[i]
                )));
            }
        }

        let active = self.active_from_counters(&point, &sizes);
        let blocking: Vec<usize> = active
            .indices()
            .filter(|&i| !state.active.contains(i))
            .collect();
        Ok(StepOutcome {
            state: PolyhedronState {
                point,
                active,
                cache: sizes,
            },
            alpha: scale,
            blocking,
            degenerate: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::AugmentCfg;
    use crate::driver::{steepest_descent, Status};
    use crate::lp::Method;

    fn cost(nv: usize) -> DVector<f64> {
        DVector::from_fn(nv, |v, _| ((v * 7 + 3) % 5) as f64 - 2.0)
    }

    #[test]
    fn layout_of_rows() {
        let p = PartitionPolytope::new(4, vec![1, 2], vec![3, 2]).unwrap();
        let sys = p.system();
        assert_eq!(sys.dim(), 8);
        // 4 item rows + 1 fixed-size row for cluster 1.
        assert_eq!(sys.num_eq(), 5);
        // Cluster 0 upper/lower rows + 8 non-negativity rows.
        assert_eq!(sys.num_ineq(), 10);
        assert_eq!(sys.ineq_rhs()[0], 3.0);
        assert_eq!(sys.ineq_rhs()[1], -1.0);
        assert_eq!(sys.eq_rhs()[4], 2.0);
        assert_eq!(sys.ineq_lhs()[(2, 0)], -1.0);
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(matches!(
            PartitionPolytope::new(4, vec![3, 1], vec![2, 3]),
            Err(AugmentError::InvalidInput(_))
        ));
        assert!(PartitionPolytope::new(4, vec![1], vec![2, 3]).is_err());
    }

    #[test]
    fn greedy_fill_respects_bounds() {
        let p = PartitionPolytope::new(5, vec![1, 2], vec![3, 3]).unwrap();
        let y = p.find_feasible_solution().unwrap();
        p.check_feasible(&y).unwrap();
        let st = p.get_active_constraints(&y);
        assert_eq!(st.cache, vec![2, 3]);
        // Cluster 1 is full -> its upper row (2) is active.
        assert!(st.active.contains(2));
        assert!(!st.active.contains(0) && !st.active.contains(1));
        // Counters agree with the generic activity rule.
        let generic = Polyhedron::new(p.system().clone()).get_active_constraints(&y);
        assert_eq!(generic.active, st.active);

        let tight = PartitionPolytope::new(5, vec![0, 0], vec![2, 2]).unwrap();
        assert!(matches!(
            tight.find_feasible_solution(),
            Err(AugmentError::InvalidInput(_))
        ));
    }

    #[test]
    fn swap_step_moves_one_item() {
        let p = PartitionPolytope::new(3, vec![0, 0], vec![3, 3]).unwrap();
        let y = p.find_feasible_solution().unwrap();
        let st = p.get_active_constraints(&y);
        // Move item 0 from whichever cluster holds it to the other one.
        let from = if y[p.var(0, 0)] == 1.0 { 0 } else { 1 };
        let mut g = DVector::zeros(6);
        g[p.var(from, 0)] = -0.5;
        g[p.var(1 - from, 0)] = 0.5;
        let circuit = Circuit::from_direction(p.system(), g);
        let out = p.take_maximal_step(&st, &circuit).unwrap();
        assert_eq!(out.alpha, 2.0);
        p.check_feasible(&out.state.point).unwrap();
        assert!(out.blocking.contains(&(p.nonneg_offset() + p.var(from, 0))));

        let bound = p.get_max_step_size(&st, &circuit.g, None);
        assert!((bound.alpha - 2.0).abs() < 1e-12);
    }

    #[test]
    fn step_leaving_the_cube_is_rejected() {
        let p = PartitionPolytope::new(2, vec![0, 0], vec![2, 2]).unwrap();
        let y = p.find_feasible_solution().unwrap();
        let st = p.get_active_constraints(&y);
        let mut g = DVector::zeros(4);
        g[0] = 2.0;
        g[1] = 1.0;
        let circuit = Circuit::from_direction(p.system(), g);
        assert!(matches!(
            p.take_maximal_step(&st, &circuit),
            Err(AugmentError::InvalidStep(_))
        ));
    }

    #[test]
    fn fractional_start_uses_slack_rule_and_reaches_relaxation_optimum() {
        let p = PartitionPolytope::new(2, vec![0, 0], vec![2, 2])
            .unwrap()
            .with_cost(DVector::from_vec(vec![1.0, -1.0, -2.0, 3.0]))
            .unwrap();
        let y0 = DVector::from_vec(vec![0.3, 0.7, 0.7, 0.3]);
        p.check_feasible(&y0).unwrap();

        let st = p.get_active_constraints(&y0);
        let generic = p.inner().get_active_constraints(&y0);
        assert_eq!(st.active, generic.active);
        assert_eq!(st.active.count(), 0);

        for method in [Method::Dual, Method::Primal] {
            let cfg = AugmentCfg::default().with_method(method);
            let res = steepest_descent(&p, &y0, cfg).unwrap();
            assert_eq!(res.status, Status::Optimal);
            let baseline = p.solve_lp(Method::Primal).unwrap();
            assert!((baseline.objective + 3.0).abs() < 1e-9);
            assert!(
                (res.objective - baseline.objective).abs() < 1e-6,
                "{method}: augmented {} vs relaxation {}",
                res.objective,
                baseline.objective
            );
            p.check_feasible(&res.point).unwrap();
        }
    }

    #[test]
    fn augmentation_matches_lp_relaxation() {
        for (n, lower, upper) in [
            (6, vec![1, 1, 1], vec![3, 3, 3]),
            (5, vec![2, 0], vec![2, 5]),
            (7, vec![0, 2, 1], vec![4, 4, 4]),
        ] {
            let p = PartitionPolytope::new(n, lower, upper).unwrap();
            let nv = p.num_vars();
            let p = p.with_cost(cost(nv)).unwrap();
            let y0 = p.find_feasible_solution().unwrap();
            let res = steepest_descent(&p, &y0, AugmentCfg::default()).unwrap();
            assert_eq!(res.status, Status::Optimal);
            let baseline = p.solve_lp(Method::Primal).unwrap();
            assert!(
                (baseline.objective - res.objective).abs() < 1e-6,
                "augmented {} vs relaxation {}",
                res.objective,
                baseline.objective
            );
            assert!(res.point.iter().all(|&v| v == 0.0 || v == 1.0));
            assert!(res.trace.iter().all(|r| !r.degenerate));
        }
    }
}
