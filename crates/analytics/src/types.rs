// In crates/analytics/src/types.rs

use core_types::{ExecutionResult, ExecutionStrategy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Running counters for one execution strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyMetrics {
    pub total_orders: u64,
    pub successful_orders: u64,
    pub failed_orders: u64,
    /// Incremental mean over results that reported slippage.
    pub average_slippage: Decimal,
    pub slippage_samples: u64,
    pub total_slippage: Decimal,
    pub total_transaction_cost: Decimal,
    pub average_execution_time_ms: f64,
}

impl StrategyMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_orders == 0 {
            return 0.0;
        }
        self.successful_orders as f64 / self.total_orders as f64
    }
}

/// Everything the recorder accumulates until it is reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub overall: StrategyMetrics,
    pub by_strategy: HashMap<ExecutionStrategy, StrategyMetrics>,
    /// Most recent results, oldest first.
    pub history: VecDeque<ExecutionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySummary {
    pub total_orders: u64,
    pub successful_orders: u64,
    pub failed_orders: u64,
    pub success_rate: f64,
    pub average_slippage: Decimal,
    pub total_transaction_cost: Decimal,
    pub average_execution_time_ms: f64,
}

impl From<&StrategyMetrics> for StrategySummary {
    fn from(metrics: &StrategyMetrics) -> Self {
        Self {
            total_orders: metrics.total_orders,
            successful_orders: metrics.successful_orders,
            failed_orders: metrics.failed_orders,
            success_rate: metrics.success_rate(),
            average_slippage: metrics.average_slippage,
            total_transaction_cost: metrics.total_transaction_cost,
            average_execution_time_ms: metrics.average_execution_time_ms,
        }
    }
}

/// A point-in-time report derived from [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_orders: u64,
    pub successful_orders: u64,
    pub failed_orders: u64,
    /// `successful_orders / total_orders`, or 0 before any order.
    pub success_rate: f64,
    pub average_slippage: Decimal,
    pub total_transaction_cost: Decimal,
    pub average_execution_time_ms: f64,
    pub by_strategy: HashMap<ExecutionStrategy, StrategySummary>,
    pub recent_executions: Vec<ExecutionResult>,
}
