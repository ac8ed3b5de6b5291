// In crates/execution/src/exchange.rs

use crate::Result;
use crate::types::{AccountBalance, MarketData, OrderFill, OrderRequest, OrderStatus};
use async_trait::async_trait;
use core_types::Symbol;
use rust_decimal::Decimal;

/// The venue abstraction the order executor trades against.
///
/// Any collaborator that can quote, fill and report on orders satisfies it:
/// a real REST/WebSocket connector or the in-memory [`SimulatedExchange`].
///
/// [`SimulatedExchange`]: crate::simulated::SimulatedExchange
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// The registry name of this venue.
    fn name(&self) -> &str;

    /// Current top of book for `symbol`.
    async fn get_market_data(&self, symbol: &Symbol) -> Result<MarketData>;

    /// Sends one order and waits for its fill.
    async fn execute_order(&self, order: &OrderRequest) -> Result<OrderFill>;

    async fn get_account_balance(&self) -> Result<AccountBalance>;

    async fn check_order_status(&self, order_id: &str) -> Result<OrderStatus>;

    /// Up to `lookback` most recent traded prices, oldest first.
    ///
    /// Venues without history return nothing, and callers fall back to a
    /// default volatility.
    async fn recent_prices(&self, _symbol: &Symbol, _lookback: usize) -> Result<Vec<Decimal>> {
        Ok(Vec::new())
    }
}
