//! Tolerance defaults and driver configuration.
//!
//! Policy
//! - One absolute tolerance `EPS` for activity, rates, ties, degenerate steps
//!   and the optimality test. Polytopes own their copy (`eps()`), so every
//!   component of a run compares against the same number.
//! - Defaults are fixed constants; callers override via `with_eps` on the
//!   polytope or via `AugmentCfg` fields, never per call site.

use std::time::Duration;

use crate::lp::Method;

/// Activity / rate / tie tolerance.
pub const EPS: f64 = 1e-9;
/// Largest denominator tried when rationalizing a circuit for display.
pub(crate) const MAX_CIRCUIT_DENOMINATOR: u32 = 1000;
/// Integrality tolerance when rationalizing a circuit.
pub(crate) const INTEGRALITY_EPS: f64 = 1e-6;

/// Augmentation driver configuration.
#[derive(Clone, Copy, Debug)]
pub struct AugmentCfg {
    /// How the direction subproblem is re-solved each iteration.
    pub method: Method,
    /// Wall-clock budget, checked once per outer iteration.
    pub max_time: Option<Duration>,
    /// Emit an `info` progress line every `log_every` iterations (0 disables).
    pub log_every: usize,
    /// Log every direction solve at `info` instead of `trace`.
    pub verbose: bool,
}

impl Default for AugmentCfg {
    fn default() -> Self {
        Self {
            method: Method::Dual,
            max_time: None,
            log_every: 20,
            verbose: false,
        }
    }
}

impl AugmentCfg {
    pub fn with_max_time(mut self, limit: Duration) -> Self {
        self.max_time = Some(limit);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}
