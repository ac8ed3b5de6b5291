// In crates/risk/src/evaluator.rs

use crate::types::{PositionSizing, RiskDecision, RiskParameters};
use crate::{Error, Result, RiskManager};
use core_types::{PortfolioState, RiskMetrics, TradeAction, TradeSignal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Approved trades must project at least this much reward per unit of risk.
pub const MIN_RISK_REWARD_RATIO: Decimal = dec!(1.5);

/// Reward multiple used when a signal carries no take-profit.
const DEFAULT_REWARD_MULTIPLE: Decimal = dec!(2);

/// Gates and sizes trade signals against portfolio-level risk limits.
///
/// The evaluator is read-only with respect to the portfolio: it is handed a
/// snapshot and never mutates it. Callers apply fills to the ledger
/// separately once an order actually trades.
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    params: RiskParameters,
}

impl RiskEvaluator {
    /// Creates an evaluator after validating its parameters.
    pub fn new(params: RiskParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &RiskParameters {
        &self.params
    }

    /// Replaces the risk parameters. The old parameters stay in force if the
    /// new ones are invalid.
    pub fn update_parameters(&mut self, params: RiskParameters) -> Result<()> {
        params.validate()?;
        tracing::info!(?params, "Risk parameters updated.");
        self.params = params;
        Ok(())
    }

    /// Position size for an entry at `entry_price` with the given stop.
    ///
    /// Fails with [`Error::ZeroRiskDistance`] when the stop sits on the entry,
    /// which indicates a caller bug rather than a market condition.
    pub fn calculate_position_size(
        &self,
        portfolio_value: Decimal,
        entry_price: Decimal,
        stop_loss: Decimal,
    ) -> Result<Decimal> {
        if entry_price <= Decimal::ZERO {
            return Err(Error::Sizing(format!("entry price must be positive, got {entry_price}")));
        }
        let cap = portfolio_value * self.params.max_position_size / entry_price;

        let size = match self.params.position_sizing {
            PositionSizing::RiskBased => {
                let risk_distance = (entry_price - stop_loss).abs() / entry_price;
                if risk_distance.is_zero() {
                    return Err(Error::ZeroRiskDistance { entry_price });
                }
                (portfolio_value * self.params.risk_per_trade) / (entry_price * risk_distance)
            }
            PositionSizing::FixedSize => cap,
        };

        Ok(size.min(cap))
    }

    /// Stop-loss and take-profit for a signal, derived where it carries none.
    pub fn resolve_exits(&self, signal: &TradeSignal, entry_price: Decimal) -> (Decimal, Decimal) {
        let is_buy = signal.action != TradeAction::Sell;

        let stop_loss = signal.params.stop_loss.unwrap_or_else(|| {
            if is_buy {
                entry_price * (Decimal::ONE - self.params.stop_loss_default)
            } else {
                entry_price * (Decimal::ONE + self.params.stop_loss_default)
            }
        });

        let take_profit = signal.params.take_profit.unwrap_or_else(|| {
            let reward = (entry_price - stop_loss).abs() * DEFAULT_REWARD_MULTIPLE;
            if is_buy { entry_price + reward } else { entry_price - reward }
        });

        (stop_loss, take_profit)
    }

    /// Runs every entry rule in order, returning the enriched signal or the
    /// first rule that refused it.
    fn assess(
        &self,
        signal: &TradeSignal,
        market_price: Option<Decimal>,
        portfolio: &PortfolioState,
    ) -> Result<TradeSignal> {
        validate_signal(signal)?;

        let entry_price = signal
            .params
            .entry_price
            .filter(|p| *p > Decimal::ZERO)
            .or(market_price.filter(|p| *p > Decimal::ZERO))
            .ok_or_else(|| Error::MissingPrice { symbol: signal.symbol.clone() })?;

        if portfolio.current_exposure >= self.params.max_total_exposure {
            return Err(Error::ExposureExceeded {
                current: portfolio.current_exposure,
                max: self.params.max_total_exposure,
            });
        }
        if portfolio.current_drawdown >= self.params.max_drawdown {
            return Err(Error::DrawdownExceeded {
                current: portfolio.current_drawdown,
                max: self.params.max_drawdown,
            });
        }

        if let (Some(position), Some(direction)) = (
            portfolio.position(&signal.symbol),
            signal.action.implied_direction(),
        ) {
            if position.direction == direction {
                return Err(Error::DuplicatePosition {
                    direction,
                    symbol: signal.symbol.clone(),
                });
            }
        }

        let portfolio_value = portfolio.total_value;
        if portfolio_value <= Decimal::ZERO {
            return Err(Error::Sizing("portfolio has no value to allocate".to_string()));
        }

        let (stop_loss, take_profit) = self.resolve_exits(signal, entry_price);
        if stop_loss == entry_price {
            return Err(Error::ZeroRiskDistance { entry_price });
        }
        let mut position_size = self.calculate_position_size(portfolio_value, entry_price, stop_loss)?;
        if let Some(requested) = signal.params.position_size.filter(|s| *s > Decimal::ZERO) {
            position_size = position_size.min(requested);
        }

        let risk_distance = (entry_price - stop_loss).abs();
        let risk_reward_ratio = (entry_price - take_profit).abs() / risk_distance;
        if risk_reward_ratio < MIN_RISK_REWARD_RATIO {
            return Err(Error::InsufficientRiskReward {
                ratio: risk_reward_ratio,
                minimum: MIN_RISK_REWARD_RATIO,
            });
        }

        let max_loss = risk_distance * position_size;
        let mut approved = signal.clone();
        approved.params.entry_price = Some(entry_price);
        approved.params.stop_loss = Some(stop_loss);
        approved.params.take_profit = Some(take_profit);
        approved.params.position_size = Some(position_size);
        approved.risk_metrics = Some(RiskMetrics {
            risk_reward_ratio,
            max_loss,
            position_risk: max_loss / portfolio_value,
            var95: max_loss,
        });
        Ok(approved)
    }
}

impl RiskManager for RiskEvaluator {
    fn name(&self) -> &'static str {
        "RiskEvaluator"
    }

    fn evaluate_trade(
        &self,
        signal: &TradeSignal,
        market_price: Option<Decimal>,
        portfolio: &PortfolioState,
    ) -> RiskDecision {
        // Closing never adds risk, so it skips every entry rule.
        if signal.action == TradeAction::Close {
            return RiskDecision::approve("Close signals are always approved", signal.clone());
        }

        match self.assess(signal, market_price, portfolio) {
            Ok(approved) => {
                tracing::info!(
                    symbol = %signal.symbol,
                    action = %signal.action,
                    position_size = ?approved.params.position_size,
                    "Signal approved by risk evaluator."
                );
                RiskDecision::approve("Trade approved", approved)
            }
            Err(e) => {
                tracing::warn!(symbol = %signal.symbol, reason = %e, "Risk evaluator rejected the signal.");
                RiskDecision::reject(e.to_string())
            }
        }
    }
}

/// Structural checks that do not depend on portfolio state.
fn validate_signal(signal: &TradeSignal) -> Result<()> {
    if signal.symbol.as_str().trim().is_empty() {
        return Err(Error::InvalidSignal("symbol is empty".to_string()));
    }
    if !(0.0..=1.0).contains(&signal.confidence) {
        return Err(Error::InvalidSignal(format!(
            "confidence {} is outside [0, 1]",
            signal.confidence
        )));
    }
    Ok(())
}
