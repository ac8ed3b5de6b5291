// In crates/core-types/src/types.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A trading pair identifier (e.g., "BTC-USD").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The action a strategy proposes for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Close,
}

impl TradeAction {
    /// The position direction an opening action implies. `Close` implies none.
    pub fn implied_direction(&self) -> Option<Direction> {
        match self {
            TradeAction::Buy => Some(Direction::Long),
            TradeAction::Sell => Some(Direction::Short),
            TradeAction::Close => None,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("BUY"),
            TradeAction::Sell => f.write_str("SELL"),
            TradeAction::Close => f.write_str("CLOSE"),
        }
    }
}

/// The direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

/// The side of an order sent to an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The order side that opens a position in `direction`.
    pub fn opening(direction: Direction) -> Self {
        match direction {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// The order side that flattens a position in `direction`.
    pub fn closing(direction: Direction) -> Self {
        Self::opening(direction.opposite())
    }
}

/// The order-placement algorithms the executor knows about.
///
/// This is a closed set: strategies are selected by identifier, never
/// supplied at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    Market,
    Limit,
    Smart,
    Iceberg,
}

impl ExecutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::Market => "market",
            ExecutionStrategy::Limit => "limit",
            ExecutionStrategy::Smart => "smart",
            ExecutionStrategy::Iceberg => "iceberg",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Ok(ExecutionStrategy::Market),
            "limit" => Ok(ExecutionStrategy::Limit),
            "smart" => Ok(ExecutionStrategy::Smart),
            "iceberg" => Ok(ExecutionStrategy::Iceberg),
            other => Err(crate::Error::UnknownStrategy(other.to_string())),
        }
    }
}

/// Pricing and order parameters attached to a signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<ExecutionStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<String>,
    /// Seconds a resting order may live before it is reported as expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_tolerance: Option<Decimal>,
}

/// Risk figures the evaluator attaches to an approved signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub risk_reward_ratio: Decimal,
    /// Loss if the stop-loss is hit: `|entry - stop| * size`.
    pub max_loss: Decimal,
    /// `max_loss` as a fraction of portfolio value.
    pub position_risk: Decimal,
    /// Simplified one-day 95% VaR. Equal to `max_loss`.
    pub var95: Decimal,
}

/// A proposed trade produced by a strategy.
///
/// Signals are never mutated in place; the risk evaluator returns an
/// enriched copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub action: TradeAction,
    pub symbol: Symbol,
    pub confidence: f64,
    #[serde(default)]
    pub strategy_id: String,
    #[serde(default)]
    pub params: SignalParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_metrics: Option<RiskMetrics>,
}

impl TradeSignal {
    pub fn new(action: TradeAction, symbol: Symbol, confidence: f64) -> Self {
        Self {
            action,
            symbol,
            confidence,
            strategy_id: String::new(),
            params: SignalParams::default(),
            risk_metrics: None,
        }
    }

    pub fn with_entry_price(mut self, price: Decimal) -> Self {
        self.params.entry_price = Some(price);
        self
    }

    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.params.stop_loss = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.params.take_profit = Some(price);
        self
    }

    pub fn with_position_size(mut self, size: Decimal) -> Self {
        self.params.position_size = Some(size);
        self
    }

    pub fn with_strategy_id(mut self, id: impl Into<String>) -> Self {
        self.strategy_id = id.into();
        self
    }

    /// The order side needed to carry out an opening action.
    pub fn side(&self) -> Option<Side> {
        self.action.implied_direction().map(Side::opening)
    }
}

/// A single open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: Symbol,
    pub direction: Direction,
    pub quantity: Decimal,
    pub average_price: Decimal,
    /// Always `quantity * average_price`.
    pub value: Decimal,
    pub open_time: DateTime<Utc>,
}

impl Position {
    pub fn new(symbol: Symbol, direction: Direction, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol,
            direction,
            quantity,
            average_price: price,
            value: quantity * price,
            open_time: Utc::now(),
        }
    }
}

/// The running model of portfolio value, exposure and drawdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    pub total_value: Decimal,
    pub positions: HashMap<Symbol, Position>,
    pub current_exposure: Decimal,
    pub high_water_mark: Decimal,
    pub current_drawdown: Decimal,
}

impl PortfolioState {
    /// A flat portfolio holding `initial_value`.
    pub fn new(initial_value: Decimal) -> Self {
        Self {
            total_value: initial_value,
            positions: HashMap::new(),
            current_exposure: Decimal::ZERO,
            high_water_mark: initial_value,
            current_drawdown: Decimal::ZERO,
        }
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }
}

/// Per-call overrides for the executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ExecutionStrategy>,
    /// Registered exchange to route to. Falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_tolerance: Option<Decimal>,
}

/// The outcome of one logical trade, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub strategy: ExecutionStrategy,
    /// Wall-clock milliseconds, including retries.
    pub execution_time: u64,
}

impl ExecutionResult {
    /// A failed result with no fill.
    pub fn failure(strategy: ExecutionStrategy, error: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: None,
            executed_price: None,
            executed_quantity: None,
            slippage: None,
            transaction_cost: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
            strategy,
            execution_time: 0,
        }
    }

    /// Whether any quantity actually traded, even on a failed aggregate.
    pub fn has_fill(&self) -> bool {
        matches!(self.executed_quantity, Some(q) if q > Decimal::ZERO)
            && self.executed_price.is_some()
    }
}
