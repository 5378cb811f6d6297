//! Circuit directions and their normalized display form.
//!
//! A circuit of `P = {Ax = b, Bx <= d}` is a direction `g` in `ker A` whose
//! support in `Bg` is inclusion-minimal. The direction subproblem returns `g`
//! normalized by `||Bg||_1 = 1`; for reporting we also rescale it to the
//! coprime integer vector it is proportional to (when such a vector exists).

use nalgebra::{DMatrix, DVector, SVD};

use crate::cfg::{INTEGRALITY_EPS, MAX_CIRCUIT_DENOMINATOR};
use crate::polyhedron::LinearSystem;

/// Direction plus the `Bg = y_pos - y_neg` split returned by the subproblem.
#[derive(Clone, Debug, PartialEq)]
pub struct Circuit {
    pub g: DVector<f64>,
    pub y_pos: DVector<f64>,
    pub y_neg: DVector<f64>,
    /// `c·g` under the `||Bg||_1 = 1` normalization; negative means improving.
    pub steepness: f64,
}

impl Circuit {
    /// Per-row rate `(Bg)_i`.
    pub fn rates(&self) -> DVector<f64> {
        &self.y_pos - &self.y_neg
    }

    /// Wrap an explicit direction, splitting `Bg` into its positive and
    /// negative parts. The direction is not rescaled.
    pub fn from_direction(system: &LinearSystem, g: DVector<f64>) -> Self {
        let bg = system.ineq_lhs() * &g;
        let y_pos = bg.map(|v| v.max(0.0));
        let y_neg = bg.map(|v| (-v).max(0.0));
        let steepness = system.objective_value(&g);
        Self {
            g,
            y_pos,
            y_neg,
            steepness,
        }
    }
}

/// Rescale `g` to the circuit it lies on, in integer form when possible.
///
/// Steps:
/// 1. Collect the rows of `A` and the rows of `B` with `|(Bg)_i| <= eps`.
/// 2. Project `g` onto the null space of that stack (SVD, rank cut at `eps`).
/// 3. Divide by the smallest non-negligible entry; search a multiplier
///    `k <= MAX_CIRCUIT_DENOMINATOR` that makes every entry integral, then
///    divide by the gcd.
///
/// The sign always agrees with `g`. If no integer form is found the scaled
/// direction from step 3 is returned.
pub fn normalized_circuit(system: &LinearSystem, g: &DVector<f64>, eps: f64) -> DVector<f64> {
    let n = g.len();
    let bg = system.ineq_lhs() * g;
    let zero_rows: Vec<usize> = (0..system.num_ineq())
        .filter(|&i| bg[i].abs() <= eps)
        .collect();
    let k = system.num_eq() + zero_rows.len();

    let dir = if k == 0 || n == 0 {
        g.clone()
    } else {
        // Pad to at least n rows so the SVD yields a full n×n V^T.
        let mut stack = DMatrix::zeros(k.max(n), n);
        for i in 0..system.num_eq() {
            stack.set_row(i, &system.eq_lhs().row(i));
        }
        for (r, &i) in zero_rows.iter().enumerate() {
            stack.set_row(system.num_eq() + r, &system.ineq_lhs().row(i));
        }
        project_onto_kernel(stack, g, eps)
    };
    integer_form(&dir, g, eps)
}

fn project_onto_kernel(stack: DMatrix<f64>, g: &DVector<f64>, eps: f64) -> DVector<f64> {
    let svd = SVD::new(stack, false, true);
    let Some(v_t) = svd.v_t else {
        return g.clone();
    };
    let s_max = svd.singular_values.max();
    let cut = eps.max(s_max * eps);
    let mut proj = DVector::zeros(g.len());
    for (r, &s) in svd.singular_values.iter().enumerate() {
        if s <= cut {
            let v = v_t.row(r).transpose();
            proj += &v * v.dot(g);
        }
    }
    if proj.norm() <= eps {
        g.clone()
    } else {
        proj
    }
}

fn integer_form(dir: &DVector<f64>, reference: &DVector<f64>, eps: f64) -> DVector<f64> {
    let min_abs = dir
        .iter()
        .map(|v| v.abs())
        .filter(|&a| a > eps)
        .fold(f64::INFINITY, f64::min);
    if !min_abs.is_finite() {
        return dir.clone();
    }
    let mut out = dir.map(|v| if v.abs() > eps { v / min_abs } else { 0.0 });

    for k in 1..=MAX_CIRCUIT_DENOMINATOR {
        let scaled = &out * f64::from(k);
        if scaled
            .iter()
            .all(|v| (v - v.round()).abs() <= INTEGRALITY_EPS * f64::from(k))
        {
            let ints: Vec<i64> = scaled.iter().map(|v| v.round() as i64).collect();
            let div = ints.iter().fold(0_i64, |acc, &v| gcd(acc, v.abs())).max(1);
            out = DVector::from_iterator(ints.len(), ints.iter().map(|&v| (v / div) as f64));
            break;
        }
    }

    if let Some(i) = reference.iter().position(|v| v.abs() > eps) {
        if out[i] * reference[i] < 0.0 {
            out = -out;
        }
    }
    out
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
