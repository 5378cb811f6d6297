//! Iterate state threaded through the driver: point, active rows, cache.

use nalgebra::DVector;

/// Activity flags indexed by inequality row (fixed size `m_B`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveSet {
    rows: Vec<bool>,
}

impl ActiveSet {
    pub fn empty(num_rows: usize) -> Self {
        Self {
            rows: vec![false; num_rows],
        }
    }

    pub fn from_indices(num_rows: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::empty(num_rows);
        for i in indices {
            set.insert(i);
        }
        set
    }

    /// Number of inequality rows tracked (active or not).
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn contains(&self, row: usize) -> bool {
        self.rows[row]
    }

    #[inline]
    pub fn insert(&mut self, row: usize) {
        self.rows[row] = true;
    }

    /// Number of active rows.
    pub fn count(&self) -> usize {
        self.rows.iter().filter(|&&a| a).count()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| a.then_some(i))
    }

    pub fn is_superset_of(&self, other: &ActiveSet) -> bool {
        self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(&a, &b)| a || !b)
    }

    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.rows
    }
}

/// Current iterate of a polytope.
///
/// `cache` is variant bookkeeping derived from `point` (`B·x` for generic
/// polyhedra, cluster sizes for partition polytopes).
#[derive(Clone, Debug)]
pub struct PolyhedronState<C> {
    pub point: DVector<f64>,
    pub active: ActiveSet,
    pub cache: C,
}
