// In crates/risk/src/types.rs

use crate::{Error, Result};
use core_types::TradeSignal;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How the evaluator turns portfolio value into a position size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionSizing {
    /// Size so that hitting the stop-loss loses `risk_per_trade` of the portfolio.
    RiskBased,
    /// Always allocate `max_position_size` of the portfolio.
    FixedSize,
}

/// Portfolio-level risk limits. All fractions are of total portfolio value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    /// Largest notional a single position may take, as a fraction (e.g., 0.1 for 10%).
    pub max_position_size: Decimal,
    /// Exposure at or above which new entries are refused.
    pub max_total_exposure: Decimal,
    /// Drawdown at or above which new entries are refused.
    pub max_drawdown: Decimal,
    /// Stop distance used when a signal carries no stop-loss (e.g., 0.02 for 2%).
    pub stop_loss_default: Decimal,
    pub position_sizing: PositionSizing,
    /// Fraction of the portfolio put at risk by one trade under risk-based sizing.
    pub risk_per_trade: Decimal,
    /// Accepted for configuration compatibility; no rule consults it yet.
    pub correlation_threshold: Decimal,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            max_position_size: dec!(0.1),
            max_total_exposure: dec!(0.8),
            max_drawdown: dec!(0.15),
            stop_loss_default: dec!(0.02),
            position_sizing: PositionSizing::RiskBased,
            risk_per_trade: dec!(0.01),
            correlation_threshold: dec!(0.7),
        }
    }
}

impl RiskParameters {
    /// Checks that every limit is a usable fraction.
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("max_position_size", self.max_position_size),
            ("max_total_exposure", self.max_total_exposure),
            ("max_drawdown", self.max_drawdown),
            ("stop_loss_default", self.stop_loss_default),
            ("risk_per_trade", self.risk_per_trade),
        ];
        for (name, value) in fractions {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(Error::InvalidParameters(format!(
                    "{name} must be within (0, 1], got {value}"
                )));
            }
        }
        if self.correlation_threshold < Decimal::ZERO || self.correlation_threshold > Decimal::ONE {
            return Err(Error::InvalidParameters(format!(
                "correlation_threshold must be within [0, 1], got {}",
                self.correlation_threshold
            )));
        }
        Ok(())
    }
}

/// The outcome of evaluating one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDecision {
    pub approved: bool,
    pub reason: String,
    /// The sized, enriched copy of the signal. Present only when approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_signal: Option<TradeSignal>,
}

impl RiskDecision {
    pub fn approve(reason: impl Into<String>, modified_signal: TradeSignal) -> Self {
        Self {
            approved: true,
            reason: reason.into(),
            modified_signal: Some(modified_signal),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            modified_signal: None,
        }
    }
}
