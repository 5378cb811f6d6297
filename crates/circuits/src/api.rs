//! Curated internal API for the CLI and experiments (UNSTABLE).
//!
//! Important
//! - This is not a public API. Breaking changes are allowed and expected.
//! - Prefer these re-exports for clarity and consistency across callers.

// Problem data and polytopes
pub use crate::polyhedron::{
    ActiveSet, CircuitPolytope, LinearSystem, Polyhedron, PolyhedronState, StepBound, StepOutcome,
};
pub use crate::variants::{PartitionPolytope, Spindle};
// Directions
pub use crate::circuit::{normalized_circuit, Circuit};
pub use crate::subproblem::{DirectionSolve, DirectionSubproblem};
// Augmentation
pub use crate::cfg::{AugmentCfg, EPS};
pub use crate::driver::{
    solve_with_defaults, steepest_descent, AugmentResult, AugmentationDriver, IterationRecord,
    Status,
};
pub use crate::error::AugmentError;
// LP engine adapter
pub use crate::lp::{LpModel, LpOutcome, LpSession, LpStatus, Method, RowOp};
