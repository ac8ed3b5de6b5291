// In crates/analytics/src/recorder.rs

use crate::types::{ExecutionMetrics, MetricsSummary, StrategyMetrics, StrategySummary};
use core_types::{ExecutionResult, ExecutionStrategy};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

/// How many results the recorder keeps by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// How many of the most recent results a summary carries.
pub const SUMMARY_RECENT_ENTRIES: usize = 10;

/// Aggregates execution outcomes overall and per strategy.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    metrics: ExecutionMetrics,
    history_limit: usize,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl MetricsRecorder {
    pub fn new(history_limit: usize) -> Self {
        Self {
            metrics: ExecutionMetrics::default(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    /// Folds one result into the running totals.
    pub fn record(&mut self, result: &ExecutionResult, strategy: ExecutionStrategy) {
        accumulate(&mut self.metrics.overall, result);
        accumulate(self.metrics.by_strategy.entry(strategy).or_default(), result);

        self.metrics.history.push_back(result.clone());
        while self.metrics.history.len() > self.history_limit {
            self.metrics.history.pop_front();
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let overall = &self.metrics.overall;
        let skip = self.metrics.history.len().saturating_sub(SUMMARY_RECENT_ENTRIES);
        MetricsSummary {
            total_orders: overall.total_orders,
            successful_orders: overall.successful_orders,
            failed_orders: overall.failed_orders,
            success_rate: overall.success_rate(),
            average_slippage: overall.average_slippage,
            total_transaction_cost: overall.total_transaction_cost,
            average_execution_time_ms: overall.average_execution_time_ms,
            by_strategy: self
                .metrics
                .by_strategy
                .iter()
                .map(|(strategy, metrics)| (*strategy, StrategySummary::from(metrics)))
                .collect(),
            recent_executions: self.metrics.history.iter().skip(skip).cloned().collect(),
        }
    }

    pub fn reset(&mut self) {
        self.metrics = ExecutionMetrics::default();
    }
}

fn accumulate(metrics: &mut StrategyMetrics, result: &ExecutionResult) {
    metrics.total_orders += 1;
    if result.success {
        metrics.successful_orders += 1;
    } else {
        metrics.failed_orders += 1;
    }

    if let Some(slippage) = result.slippage {
        metrics.slippage_samples += 1;
        metrics.total_slippage += slippage;
        let n = Decimal::from(metrics.slippage_samples);
        metrics.average_slippage += (slippage - metrics.average_slippage) / n;
    }
    if let Some(cost) = result.transaction_cost {
        metrics.total_transaction_cost += cost;
    }

    let n = metrics.total_orders as f64;
    let latency = f64::from_u64(result.execution_time).unwrap_or(0.0);
    metrics.average_execution_time_ms += (latency - metrics.average_execution_time_ms) / n;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fill(strategy: ExecutionStrategy, slippage: Decimal, cost: Decimal, ms: u64) -> ExecutionResult {
        ExecutionResult {
            success: true,
            order_id: Some("SIM-1".to_string()),
            executed_price: Some(dec!(100)),
            executed_quantity: Some(dec!(1)),
            slippage: Some(slippage),
            transaction_cost: Some(cost),
            error: None,
            timestamp: Utc::now(),
            strategy,
            execution_time: ms,
        }
    }

    #[test]
    fn empty_recorder_reports_zero_success_rate() {
        let summary = MetricsRecorder::default().summary();
        assert_eq!(summary.total_orders, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.recent_executions.is_empty());
    }

    #[test]
    fn tracks_totals_and_running_average_slippage() {
        let mut recorder = MetricsRecorder::default();
        recorder.record(&fill(ExecutionStrategy::Market, dec!(0.002), dec!(0.1), 10), ExecutionStrategy::Market);
        recorder.record(&fill(ExecutionStrategy::Market, dec!(0.004), dec!(0.3), 30), ExecutionStrategy::Market);
        recorder.record(
            &ExecutionResult::failure(ExecutionStrategy::Limit, "expired"),
            ExecutionStrategy::Limit,
        );

        let summary = recorder.summary();
        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.successful_orders, 2);
        assert_eq!(summary.failed_orders, 1);
        assert!((summary.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.average_slippage, dec!(0.003));
        assert_eq!(summary.total_transaction_cost, dec!(0.4));

        let market = &summary.by_strategy[&ExecutionStrategy::Market];
        assert_eq!(market.total_orders, 2);
        assert_eq!(market.success_rate, 1.0);
        assert!((market.average_execution_time_ms - 20.0).abs() < 1e-9);

        let limit = &summary.by_strategy[&ExecutionStrategy::Limit];
        assert_eq!(limit.failed_orders, 1);
        assert_eq!(limit.success_rate, 0.0);
    }

    #[test]
    fn history_is_bounded_and_summary_shows_the_latest() {
        let mut recorder = MetricsRecorder::new(15);
        for ms in 0..40 {
            recorder.record(&fill(ExecutionStrategy::Market, dec!(0), dec!(0), ms), ExecutionStrategy::Market);
        }
        assert_eq!(recorder.metrics().history.len(), 15);

        let recent = recorder.summary().recent_executions;
        assert_eq!(recent.len(), SUMMARY_RECENT_ENTRIES);
        assert_eq!(recent.last().unwrap().execution_time, 39);
        assert_eq!(recent.first().unwrap().execution_time, 30);
    }

    #[test]
    fn reset_clears_everything() {
        let mut recorder = MetricsRecorder::default();
        recorder.record(&fill(ExecutionStrategy::Iceberg, dec!(0.01), dec!(1), 5), ExecutionStrategy::Iceberg);
        recorder.reset();
        assert_eq!(recorder.metrics(), &ExecutionMetrics::default());
    }

    #[test]
    fn summary_serializes_strategy_keys_as_names() {
        let mut recorder = MetricsRecorder::default();
        recorder.record(&fill(ExecutionStrategy::Iceberg, dec!(0.01), dec!(1), 5), ExecutionStrategy::Iceberg);
        let json = serde_json::to_value(recorder.summary()).unwrap();
        assert_eq!(json["byStrategy"]["iceberg"]["totalOrders"], 1);
    }
}
