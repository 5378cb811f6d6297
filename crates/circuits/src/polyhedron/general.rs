//! Generic dense polyhedron: activity, ratio test and steps via `B·x`.

use nalgebra::DVector;

use super::{CircuitPolytope, LinearSystem, PolyhedronState, StepBound, StepOutcome};
use crate::cfg::EPS;
use crate::circuit::{self, Circuit};
use crate::error::AugmentError;
use crate::polyhedron::ActiveSet;

/// `P = {Ax = b, Bx <= d}` with dense matrices. Cache is `B·x`.
#[derive(Clone, Debug)]
pub struct Polyhedron {
    system: LinearSystem,
    eps: f64,
}

impl Polyhedron {
    pub fn new(system: LinearSystem) -> Self {
        Self { system, eps: EPS }
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn set_objective(&mut self, cost: DVector<f64>) -> Result<(), AugmentError> {
        self.system.set_cost(cost)
    }

    /// Integer (or scaled) form of the circuit `g` lies on.
    pub fn normalized_circuit(&self, g: &DVector<f64>) -> DVector<f64> {
        circuit::normalized_circuit(&self.system, g, self.eps)
    }

    /// Move by `alpha * g` and update the active set.
    ///
    /// `alpha < eps` is treated as degenerate: the point and every active
    /// row are kept. Otherwise previously active rows with rate below `-eps`
    /// become inactive. The `blocking` rows are always added. `B·x` is
    /// recomputed from the new point rather than updated incrementally.
    pub fn advance(
        &self,
        state: &PolyhedronState<DVector<f64>>,
        g: &DVector<f64>,
        rates: &DVector<f64>,
        alpha: f64,
        blocking: &[usize],
    ) -> StepOutcome<DVector<f64>> {
        let degenerate = alpha < self.eps;
        let (point, cache) = if degenerate {
            (state.point.clone(), state.cache.clone())
        } else {
            let point = &state.point + g * alpha;
            let cache = self.system.ineq_lhs() * &point;
            (point, cache)
        };

        let mut active = ActiveSet::empty(state.active.num_rows());
        for i in state.active.indices() {
            if degenerate || rates[i] >= -self.eps {
                active.insert(i);
            }
        }
        for &i in blocking {
            active.insert(i);
        }

        StepOutcome {
            state: PolyhedronState {
                point,
                active,
                cache,
            },
            alpha: if degenerate { 0.0 } else { alpha },
            blocking: blocking.to_vec(),
            degenerate,
        }
    }
}

impl CircuitPolytope for Polyhedron {
    type Cache = DVector<f64>;

    #[inline]
    fn system(&self) -> &LinearSystem {
        &self.system
    }

    #[inline]
    fn eps(&self) -> f64 {
        self.eps
    }

    fn get_active_constraints(&self, x: &DVector<f64>) -> PolyhedronState<DVector<f64>> {
        let bx = self.system.ineq_lhs() * x;
        let d = self.system.ineq_rhs();
        let active = ActiveSet::from_indices(
            bx.len(),
            (0..bx.len()).filter(|&i| d[i] - bx[i] <= self.eps),
        );
        PolyhedronState {
            point: x.clone(),
            active,
            cache: bx,
        }
    }

    fn get_max_step_size(
        &self,
        state: &PolyhedronState<DVector<f64>>,
        g: &DVector<f64>,
        rates: Option<&DVector<f64>>,
    ) -> StepBound {
        let computed;
        let rates = match rates {
            Some(r) => r,
            None => {
                computed = self.system.ineq_lhs() * g;
                &computed
            }
        };
        let d = self.system.ineq_rhs();
        let bx = &state.cache;
        let candidates = (0..rates.len())
            .filter(|&i| !state.active.contains(i) && rates[i] > self.eps)
            .map(|i| (i, (d[i] - bx[i]).max(0.0) / rates[i]));
        StepBound::from_ratios(candidates, self.eps)
    }

    fn take_maximal_step(
        &self,
        state: &PolyhedronState<DVector<f64>>,
        circuit: &Circuit,
    ) -> Result<StepOutcome<DVector<f64>>, AugmentError> {
        if circuit.g.len() != self.system.dim() {
            return Err(AugmentError::dimension(format!(
                "direction has length {} but the polyhedron has {} variables",
                circuit.g.len(),
                self.system.dim()
            )));
        }
        let rates = circuit.rates();
        let bound = self.get_max_step_size(state, &circuit.g, Some(&rates));
        if bound.is_unbounded() {
            return Ok(StepOutcome {
                state: state.clone(),
                alpha: f64::INFINITY,
                blocking: Vec::new(),
                degenerate: false,
            });
        }
        Ok(self.advance(state, &circuit.g, &rates, bound.alpha, &bound.blocking))
    }
}
