// In crates/risk/src/lib.rs

use core_types::{PortfolioState, TradeSignal};
use rust_decimal::Decimal;

pub mod error;
pub mod evaluator;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use evaluator::{RiskEvaluator, MIN_RISK_REWARD_RATIO};
pub use types::{PositionSizing, RiskDecision, RiskParameters};

/// The universal interface for a risk management module.
///
/// A `RiskManager` evaluates a trading signal against a set of risk rules and,
/// if approved, returns a sized copy of the signal ready for execution.
pub trait RiskManager: Send + Sync {
    /// The name of the risk management strategy.
    fn name(&self) -> &'static str;

    /// Evaluates a signal against the current portfolio state.
    ///
    /// # Arguments
    ///
    /// * `signal`: The trading signal produced by a strategy.
    /// * `market_price`: The latest traded price, used when the signal carries
    ///   no entry price.
    /// * `portfolio`: A snapshot of the portfolio. It is never modified.
    ///
    /// # Returns
    ///
    /// A [`RiskDecision`]. Rejections are encoded in the decision with a
    /// human-readable reason; this method never fails.
    fn evaluate_trade(
        &self,
        signal: &TradeSignal,
        market_price: Option<Decimal>,
        portfolio: &PortfolioState,
    ) -> RiskDecision;
}
