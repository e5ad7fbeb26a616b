//! Analysis module - statistics over the retention window

mod statistics;

pub use statistics::{HistoryStats, MetricSummary, TimeRange};
