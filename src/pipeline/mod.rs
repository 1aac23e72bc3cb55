//! Windowing and temporal aggregation.

mod aggregator;
mod windower;

pub use aggregator::{DetectionRun, TemporalAggregator, WindowOutcome};
pub use windower::{Sequence, SequenceWindower};
