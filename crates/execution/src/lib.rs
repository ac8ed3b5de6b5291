// In crates/execution/src/lib.rs

use async_trait::async_trait;
use core_types::{ExecutionOptions, ExecutionResult, Symbol, TradeSignal};

pub mod error;
pub mod exchange;
pub mod executor;
pub mod router;
pub mod simulated;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use exchange::ExchangeClient;
pub use executor::{OrderExecutor, calculate_slippage, split_iceberg};
pub use router::{ExecutionRouter, MarketConditions};
pub use simulated::SimulatedExchange;
pub use types::{ExecutionSettings, MarketData, RoutingSettings, SimulationSettings};

/// The universal interface for an execution handler.
///
/// An `Executor` takes an approved, sized signal and carries it through to a
/// fill (or a failure) on some venue, live or simulated.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The name of the executor (e.g., "OrderExecutor").
    fn name(&self) -> &'static str;

    /// Executes a signal.
    ///
    /// # Arguments
    ///
    /// * `signal`: An approved signal carrying entry price and position size.
    /// * `options`: Per-call overrides (strategy, exchange, retries).
    ///
    /// # Returns
    ///
    /// The [`ExecutionResult`]. Failures are encoded in the result rather
    /// than returned as errors.
    async fn execute_trade(&self, signal: &TradeSignal, options: &ExecutionOptions) -> ExecutionResult;

    /// Current top of book for `symbol` on the named (or default) exchange.
    async fn market_data(&self, symbol: &Symbol, exchange: Option<&str>) -> Result<MarketData>;
}
