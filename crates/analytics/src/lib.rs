// In crates/analytics/src/lib.rs

pub mod recorder;
pub mod types;

pub use recorder::{DEFAULT_HISTORY_LIMIT, MetricsRecorder, SUMMARY_RECENT_ENTRIES};
pub use types::{ExecutionMetrics, MetricsSummary, StrategyMetrics, StrategySummary};
