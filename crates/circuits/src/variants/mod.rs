//! Structured polytopes with closed-form bookkeeping.

mod partition;
mod spindle;

pub use partition::PartitionPolytope;
pub use spindle::Spindle;
