// In crates/execution/src/router.rs

use crate::types::{MarketData, RoutingSettings};
use core_types::{ExecutionStrategy, TradeSignal};
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// The market inputs the router decides on.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConditions {
    /// Bid/ask spread relative to mid.
    pub spread: Decimal,
    /// Standard deviation of recent period-over-period returns.
    pub volatility: Decimal,
    /// Volume currently available at the venue.
    pub volume: Decimal,
}

impl MarketConditions {
    /// Builds conditions from a quote and recent traded prices, falling back
    /// to `default_volatility` when there is not enough history.
    pub fn from_market_data(
        data: &MarketData,
        recent_prices: &[Decimal],
        default_volatility: Decimal,
    ) -> Self {
        Self {
            spread: data.relative_spread(),
            volatility: estimate_volatility(recent_prices).unwrap_or(default_volatility),
            volume: data.volume,
        }
    }
}

/// Picks an execution strategy from a fixed decision tree.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRouter {
    settings: RoutingSettings,
}

impl ExecutionRouter {
    pub fn new(settings: RoutingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    /// Chooses between market, limit and iceberg execution.
    ///
    /// Rules are evaluated in order and the first match wins:
    /// 1. a wide spread rests a limit order;
    /// 2. a fast market takes liquidity immediately;
    /// 3. an order that is large relative to volume is split;
    /// 4. otherwise, market.
    pub fn select_strategy(&self, signal: &TradeSignal, market: &MarketConditions) -> ExecutionStrategy {
        let size = signal.params.position_size.unwrap_or(Decimal::ZERO);

        let strategy = if market.spread > self.settings.spread_threshold {
            ExecutionStrategy::Limit
        } else if market.volatility > self.settings.volatility_threshold {
            ExecutionStrategy::Market
        } else if size > market.volume * self.settings.volume_participation {
            ExecutionStrategy::Iceberg
        } else {
            ExecutionStrategy::Market
        };

        tracing::debug!(
            symbol = %signal.symbol,
            spread = %market.spread,
            volatility = %market.volatility,
            volume = %market.volume,
            %size,
            %strategy,
            "Routed order."
        );
        strategy
    }
}

/// Population standard deviation of period-over-period returns.
///
/// Returns `None` with fewer than two usable prices.
pub fn estimate_volatility(prices: &[Decimal]) -> Option<Decimal> {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > Decimal::ZERO)
        .filter_map(|w| (w[1] / w[0] - Decimal::ONE).to_f64())
        .collect();
    if returns.is_empty() {
        return None;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    Decimal::from_f64(variance.sqrt())
}
