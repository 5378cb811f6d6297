//! Error taxonomy for the augmentation library.
//!
//! Unbounded problems, degenerate steps and timeouts are outcomes, not errors:
//! they live in `driver::Status` and on step records.

use thiserror::Error;

use crate::lp::LpStatus;

/// Errors surfaced by polytopes, the direction subproblem and the driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AugmentError {
    /// An LP solve returned a non-optimal status where optimality was expected.
    #[error("LP solve failed during {context}: {status}")]
    SolverFailure {
        context: &'static str,
        status: LpStatus,
    },

    /// The caller-supplied starting point violates `Ax = b` or `Bx <= d`.
    #[error("infeasible starting point: {reason}")]
    InfeasibleStart { reason: String },

    /// Matrix/vector shapes do not agree.
    #[error("dimension mismatch: {0}")]
    Dimension(String),

    /// Parameters that cannot describe a valid problem or option.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A structured variant was asked to take a step that leaves its polytope.
    #[error("invalid step: {0}")]
    InvalidStep(String),
}

impl AugmentError {
    pub(crate) fn solver(context: &'static str, status: LpStatus) -> Self {
        Self::SolverFailure { context, status }
    }

    pub(crate) fn dimension(reason: impl Into<String>) -> Self {
        Self::Dimension(reason.into())
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}
