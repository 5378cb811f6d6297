//! Steepest-descent circuit augmentation for linear programs.
//!
//! Solves `min c·x` over `P = {x : Ax = b, Bx <= d}` by walking from a
//! feasible point along steepest improving circuits (edge directions) until
//! none exists, and compares against a direct LP solve.
//!
//! Layout
//! - `polyhedron`: constraint data, iterate state, the `CircuitPolytope` trait
//!   and the generic dense implementation.
//! - `variants`: partition polytopes and random spindles.
//! - `subproblem`: the direction LP; `driver`: the augmentation loop.
//! - `lp`: the only module that talks to the LP engine.
//!
//! API Policy
//! - This crate is project-internal. There is no stable public API; prefer
//!   the re-exports in `api` from the CLI and experiments.

pub mod api;
pub mod cfg;
pub mod circuit;
pub mod driver;
pub mod error;
pub mod lp;
pub mod polyhedron;
pub mod subproblem;
pub mod variants;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cfg::{AugmentCfg, EPS};
pub use error::AugmentError;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::cfg::{AugmentCfg, EPS};
    pub use crate::circuit::Circuit;
    pub use crate::driver::{steepest_descent, AugmentResult, AugmentationDriver, Status};
    pub use crate::error::AugmentError;
    pub use crate::lp::Method;
    pub use crate::polyhedron::{CircuitPolytope, LinearSystem, Polyhedron};
    pub use nalgebra::{DMatrix, DVector};
}
