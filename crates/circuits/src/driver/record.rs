//! Run records: terminal status, per-iteration trace, summary.

use std::fmt;
use std::time::Duration;

use nalgebra::DVector;

/// Terminal state of a run.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Optimal,
    /// `certificate` on the result is an improving ray of `P`.
    Unbounded,
    /// Wall-clock budget exhausted; `point` is the last iterate.
    Timeout,
    /// Construction or solver failure, recorded instead of propagated.
    Error(String),
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Unbounded => "unbounded",
            Self::Timeout => "timeout",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error: {msg}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One augmentation step.
#[derive(Clone, Debug)]
pub struct IterationRecord {
    pub index: usize,
    /// Direction `g` as returned by the subproblem (`||Bg||_1 = 1`).
    pub circuit: DVector<f64>,
    pub steepness: f64,
    /// Step length taken; `+inf` on the unbounded ray, 0 when degenerate.
    pub step: f64,
    /// `c·x` after the step.
    pub objective: f64,
    pub degenerate: bool,
    /// Active rows after the step.
    pub active_count: usize,
    pub lp_time: Duration,
    pub step_time: Duration,
    pub lp_iterations: Option<usize>,
    pub bound_updates: usize,
}

/// Outcome of `AugmentationDriver::run`.
#[derive(Clone, Debug)]
pub struct AugmentResult {
    pub status: Status,
    pub point: DVector<f64>,
    pub objective: f64,
    /// Improving ray when `status == Unbounded`.
    pub certificate: Option<DVector<f64>>,
    pub trace: Vec<IterationRecord>,
    pub build_time: Duration,
    pub total_time: Duration,
}

impl AugmentResult {
    #[inline]
    pub fn iterations(&self) -> usize {
        self.trace.len()
    }

    pub fn degenerate_steps(&self) -> usize {
        self.trace.iter().filter(|r| r.degenerate).count()
    }

    /// Longest run of consecutive degenerate steps.
    pub fn longest_degenerate_streak(&self) -> usize {
        let mut best = 0;
        let mut cur = 0;
        for r in &self.trace {
            cur = if r.degenerate { cur + 1 } else { 0 };
            best = best.max(cur);
        }
        best
    }

    pub fn lp_time(&self) -> Duration {
        self.trace.iter().map(|r| r.lp_time).sum()
    }
}

impl fmt::Display for AugmentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "status: {}", self.status)?;
        match (&self.status, &self.certificate) {
            (Status::Unbounded, Some(ray)) => {
                let ray: Vec<String> = ray.iter().map(|v| format!("{v:.6}")).collect();
                writeln!(f, "unbounded circuit: [{}]", ray.join(", "))?;
            }
            _ => writeln!(f, "objective: {:.9}", self.objective)?,
        }
        writeln!(
            f,
            "iterations: {} ({} degenerate)",
            self.iterations(),
            self.degenerate_steps()
        )?;
        let lp = self.lp_time().as_secs_f64();
        let mean = if self.trace.is_empty() {
            0.0
        } else {
            lp / self.trace.len() as f64
        };
        let max = self
            .trace
            .iter()
            .map(|r| r.lp_time.as_secs_f64())
            .fold(0.0, f64::max);
        writeln!(f, "lp time: total {lp:.4}s, mean {mean:.6}s, max {max:.6}s")?;
        write!(
            f,
            "build {:.4}s, total {:.4}s",
            self.build_time.as_secs_f64(),
            self.total_time.as_secs_f64()
        )
    }
}
