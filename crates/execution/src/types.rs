// In crates/execution/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{ExecutionStrategy, Side, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Executor configuration. Every field has a default so partial config
/// sections deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Strategy used when neither the call nor the signal names one.
    pub default_strategy: ExecutionStrategy,
    /// Registry name used when the call does not name an exchange.
    pub default_exchange: String,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Largest adverse deviation of the quote from entry a market order accepts.
    pub slippage_tolerance: Decimal,
    /// Parsed and logged, but not enforced by any transition.
    pub circuit_breaker_threshold: Option<Decimal>,
    pub expire_after_seconds: u64,
    /// Largest notional (size * entry) a single trade may request.
    pub order_size_limit: Option<Decimal>,
    /// Fee charged on notional for every fill (e.g., 0.001 for 0.1%).
    pub fee_rate: Decimal,
    /// How far from entry, in our favour, limit orders rest.
    pub limit_price_offset: Decimal,
    /// Chance a non-marketable limit order fills before it expires.
    pub limit_fill_probability: f64,
    /// Simulated time a resting limit order waits for a fill.
    pub limit_fill_wait_ms: u64,
    pub iceberg_chunks: u32,
    pub iceberg_chunk_delay_ms: u64,
    pub routing: RoutingSettings,
    /// Used for exchanges the executor provisions on its own.
    pub simulation: SimulationSettings,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_strategy: ExecutionStrategy::Smart,
            default_exchange: "simulated".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
            slippage_tolerance: dec!(0.01),
            circuit_breaker_threshold: None,
            expire_after_seconds: 300,
            order_size_limit: None,
            fee_rate: dec!(0.001),
            limit_price_offset: dec!(0.001),
            limit_fill_probability: 0.7,
            limit_fill_wait_ms: 100,
            iceberg_chunks: 10,
            iceberg_chunk_delay_ms: 1000,
            routing: RoutingSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

/// Thresholds for the smart-order router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Relative spread above which resting limit orders are preferred.
    pub spread_threshold: Decimal,
    /// Volatility above which immediate market fills are preferred.
    pub volatility_threshold: Decimal,
    /// Share of available volume above which orders are split.
    pub volume_participation: Decimal,
    /// Number of recent prices used to estimate volatility.
    pub volatility_lookback: usize,
    /// Volatility assumed when there is no price history.
    pub default_volatility: Decimal,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            spread_threshold: dec!(0.005),
            volatility_threshold: dec!(0.01),
            volume_participation: dec!(0.1),
            volatility_lookback: 20,
            default_volatility: dec!(0.005),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// The fee the simulated venue reports on each fill.
    pub taker_fee: Decimal,
    /// Simulated slippage on market orders (e.g., 0.0005 for 0.05%).
    pub slippage_percent: Decimal,
    /// Relative bid/ask spread quoted around a seeded price.
    pub spread: Decimal,
    /// Volume quoted for seeded markets.
    pub volume: Decimal,
    pub initial_balance: Decimal,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            taker_fee: dec!(0.001),
            slippage_percent: Decimal::ZERO,
            spread: dec!(0.0002),
            volume: dec!(1000000),
            initial_balance: dec!(100000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit { price: Decimal },
}

/// An order as sent to an exchange client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub order_type: OrderType,
    /// The price the caller expects; venues report slippage against it.
    pub reference_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<String>,
}

/// What an exchange reports after executing an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFill {
    pub success: bool,
    pub order_id: String,
    pub executed_price: Decimal,
    pub executed_quantity: Decimal,
    pub transaction_cost: Decimal,
    pub slippage: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Top-of-book snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl MarketData {
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / dec!(2)
    }

    /// Bid/ask spread relative to the mid price.
    pub fn relative_spread(&self) -> Decimal {
        let mid = self.mid();
        if mid <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.ask - self.bid) / mid
    }

    /// The price an order on `side` would take from the book.
    pub fn touch(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub total_balance: Decimal,
    pub available_balance: Decimal,
    pub in_orders: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    pub status: OrderState,
    pub filled_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub avg_fill_price: Decimal,
}
