//! Constraint data `{x : Ax = b, Bx <= d}` with an optional objective `c`.

use nalgebra::{DMatrix, DVector};

use crate::error::AugmentError;
use crate::lp::{LpModel, RowOp};

/// Dense constraint system.
///
/// Invariants:
/// - `ineq_lhs` is `m_B × n`, `ineq_rhs` has length `m_B`.
/// - `eq_lhs` is `m_A × n` (possibly zero rows), `eq_rhs` has length `m_A`.
/// - `cost`, when present, has length `n`.
#[derive(Clone, Debug)]
pub struct LinearSystem {
    ineq_lhs: DMatrix<f64>,
    ineq_rhs: DVector<f64>,
    eq_lhs: DMatrix<f64>,
    eq_rhs: DVector<f64>,
    cost: Option<DVector<f64>>,
}

impl LinearSystem {
    /// Inequalities only: `Bx <= d`.
    pub fn new(ineq_lhs: DMatrix<f64>, ineq_rhs: DVector<f64>) -> Result<Self, AugmentError> {
        if ineq_lhs.nrows() != ineq_rhs.len() {
            return Err(AugmentError::dimension(format!(
                "B has {} rows but d has length {}",
                ineq_lhs.nrows(),
                ineq_rhs.len()
            )));
        }
        let n = ineq_lhs.ncols();
        Ok(Self {
            ineq_lhs,
            ineq_rhs,
            eq_lhs: DMatrix::zeros(0, n),
            eq_rhs: DVector::zeros(0),
            cost: None,
        })
    }

    /// Build from row slices; `rows` must be non-empty and rectangular.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R], rhs: &[f64]) -> Result<Self, AugmentError> {
        let n = rows
            .first()
            .map(|r| r.as_ref().len())
            .ok_or_else(|| AugmentError::dimension("B needs at least one row"))?;
        let mut flat = Vec::with_capacity(rows.len() * n);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n {
                return Err(AugmentError::dimension(format!(
                    "row {i} of B has {} entries, expected {n}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        Self::new(
            DMatrix::from_row_slice(rows.len(), n, &flat),
            DVector::from_column_slice(rhs),
        )
    }

    /// Attach equalities `Ax = b`.
    pub fn with_equalities(
        mut self,
        eq_lhs: DMatrix<f64>,
        eq_rhs: DVector<f64>,
    ) -> Result<Self, AugmentError> {
        if eq_lhs.nrows() != eq_rhs.len() {
            return Err(AugmentError::dimension(format!(
                "A has {} rows but b has length {}",
                eq_lhs.nrows(),
                eq_rhs.len()
            )));
        }
        if eq_lhs.ncols() != self.dim() {
            return Err(AugmentError::dimension(format!(
                "A has {} columns but B has {}",
                eq_lhs.ncols(),
                self.dim()
            )));
        }
        self.eq_lhs = eq_lhs;
        self.eq_rhs = eq_rhs;
        Ok(self)
    }

    pub fn with_cost(mut self, cost: DVector<f64>) -> Result<Self, AugmentError> {
        self.set_cost(cost)?;
        Ok(self)
    }

    pub fn set_cost(&mut self, cost: DVector<f64>) -> Result<(), AugmentError> {
        if cost.len() != self.dim() {
            return Err(AugmentError::dimension(format!(
                "c has length {} but the system has {} variables",
                cost.len(),
                self.dim()
            )));
        }
        self.cost = Some(cost);
        Ok(())
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.ineq_lhs.ncols()
    }
    #[inline]
    pub fn num_ineq(&self) -> usize {
        self.ineq_lhs.nrows()
    }
    #[inline]
    pub fn num_eq(&self) -> usize {
        self.eq_lhs.nrows()
    }
    #[inline]
    pub fn ineq_lhs(&self) -> &DMatrix<f64> {
        &self.ineq_lhs
    }
    #[inline]
    pub fn ineq_rhs(&self) -> &DVector<f64> {
        &self.ineq_rhs
    }
    #[inline]
    pub fn eq_lhs(&self) -> &DMatrix<f64> {
        &self.eq_lhs
    }
    #[inline]
    pub fn eq_rhs(&self) -> &DVector<f64> {
        &self.eq_rhs
    }
    #[inline]
    pub fn cost(&self) -> Option<&DVector<f64>> {
        self.cost.as_ref()
    }

    pub fn require_cost(&self) -> Result<&DVector<f64>, AugmentError> {
        self.cost
            .as_ref()
            .ok_or_else(|| AugmentError::invalid("an objective vector c is required"))
    }

    /// `c·x`, or 0 without an objective.
    pub fn objective_value(&self, x: &DVector<f64>) -> f64 {
        self.cost.as_ref().map_or(0.0, |c| c.dot(x))
    }

    /// Check `Ax = b` and `Bx <= d` within `eps`; reports the worst violation.
    pub fn check_feasible(&self, x: &DVector<f64>, eps: f64) -> Result<(), AugmentError> {
        if x.len() != self.dim() {
            return Err(AugmentError::dimension(format!(
                "point has length {} but the system has {} variables",
                x.len(),
                self.dim()
            )));
        }
        if self.num_eq() > 0 {
            let residual = &self.eq_lhs * x - &self.eq_rhs;
            let worst = residual.iamax();
            if residual[worst].abs() > eps {
                return Err(AugmentError::InfeasibleStart {
                    reason: format!(
                        "equality row {worst} has residual {:.3e}",
                        residual[worst]
                    ),
                });
            }
        }
        if self.num_ineq() > 0 {
            let excess = &self.ineq_lhs * x - &self.ineq_rhs;
            let worst = excess.imax();
            if excess[worst] > eps {
                return Err(AugmentError::InfeasibleStart {
                    reason: format!("inequality row {worst} violated by {:.3e}", excess[worst]),
                });
            }
        }
        Ok(())
    }

    /// LP over this system with free variables; `cost = None` gives the zero
    /// objective (pure feasibility).
    pub fn lp_model(&self, cost: Option<&DVector<f64>>) -> LpModel {
        let n = self.dim();
        let mut model = LpModel::new();
        for j in 0..n {
            let c = cost.map_or(0.0, |c| c[j]);
            model.add_var(c, f64::NEG_INFINITY, f64::INFINITY);
        }
        for i in 0..self.num_ineq() {
            let row = self.ineq_lhs.row(i);
            model.add_row((0..n).map(|j| (j, row[j])), RowOp::Le, self.ineq_rhs[i]);
        }
        for i in 0..self.num_eq() {
            let row = self.eq_lhs.row(i);
            model.add_row((0..n).map(|j| (j, row[j])), RowOp::Eq, self.eq_rhs[i]);
        }
        model
    }
}
