// In crates/engine/src/pipeline.rs

use crate::Result;
use crate::locks::SymbolLocks;
use analytics::{MetricsRecorder, MetricsSummary};
use app_config::Settings;
use chrono::Utc;
use core_types::{
    Direction, ExecutionOptions, ExecutionResult, PortfolioState, Symbol, TradeAction, TradeSignal,
};
use events::{ExecutionResponse, PipelineEvent, PortfolioUpdate, SignalRejected, TradeExecuted};
use execution::{Executor, OrderExecutor};
use portfolio::{PortfolioLedger, TradeFill};
use risk::{RiskDecision, RiskEvaluator, RiskManager, RiskParameters};
use rust_decimal::Decimal;
use std::sync::Arc;
use store::{InMemoryStore, KnowledgeStore, categories};
use tokio::sync::{Mutex, RwLock, broadcast};

const PORTFOLIO_KEY: &str = "current";
const RISK_KEY: &str = "current";

/// The signal-to-fill pipeline: risk evaluation, execution, ledger update,
/// metrics and checkpoints for one portfolio.
pub struct TradingEngine {
    risk: RwLock<RiskEvaluator>,
    ledger: Mutex<PortfolioLedger>,
    executor: Arc<dyn Executor>,
    metrics: Mutex<MetricsRecorder>,
    store: Arc<dyn KnowledgeStore>,
    symbol_locks: SymbolLocks,
    events: broadcast::Sender<PipelineEvent>,
}

impl TradingEngine {
    pub fn new(
        settings: &Settings,
        executor: Arc<dyn Executor>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Result<Self> {
        let (events, _) = broadcast::channel(settings.app.event_capacity.max(1));
        Ok(Self {
            risk: RwLock::new(RiskEvaluator::new(settings.risk.clone())?),
            ledger: Mutex::new(PortfolioLedger::new(settings.portfolio.initial_value)),
            executor,
            metrics: Mutex::new(MetricsRecorder::new(settings.metrics.history_limit)),
            store,
            symbol_locks: SymbolLocks::new(),
            events,
        })
    }

    /// An engine backed by an [`OrderExecutor`] and an [`InMemoryStore`].
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let executor = Arc::new(OrderExecutor::new(settings.execution.clone()));
        Self::new(settings, executor, Arc::new(InMemoryStore::new()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub async fn portfolio(&self) -> PortfolioState {
        self.ledger.lock().await.snapshot()
    }

    pub async fn metrics_summary(&self) -> MetricsSummary {
        self.metrics.lock().await.summary()
    }

    pub async fn reset_metrics(&self) {
        self.metrics.lock().await.reset();
        tracing::info!("Execution metrics reset.");
    }

    pub async fn risk_parameters(&self) -> RiskParameters {
        self.risk.read().await.parameters().clone()
    }

    /// Swaps the risk limits and checkpoints them. Invalid limits leave the
    /// current ones in place.
    pub async fn update_risk_parameters(&self, params: RiskParameters) -> Result<()> {
        self.risk.write().await.update_parameters(params.clone())?;
        tracing::info!(?params, "Risk parameters updated.");
        self.checkpoint(categories::RISK_PARAMETERS, RISK_KEY, &params).await;
        Ok(())
    }

    /// Replaces the ledger with the last checkpointed portfolio, if any.
    pub async fn restore_portfolio(&self) -> Result<bool> {
        let saved: Option<PortfolioState> =
            store::get_json(self.store.as_ref(), categories::PORTFOLIO_STATE, PORTFOLIO_KEY).await?;
        let Some(state) = saved else {
            return Ok(false);
        };
        tracing::info!(
            total_value = %state.total_value,
            positions = state.positions.len(),
            "Restored portfolio from checkpoint."
        );
        *self.ledger.lock().await = PortfolioLedger::from_state(state);
        Ok(true)
    }

    /// Runs the risk check alone, without executing or touching the ledger.
    pub async fn evaluate(&self, signal: &TradeSignal, options: &ExecutionOptions) -> RiskDecision {
        let portfolio = self.portfolio().await;
        let market_price = self.market_price(&signal.symbol, options.exchange.as_deref()).await;
        self.risk.read().await.evaluate_trade(signal, market_price, &portfolio)
    }

    /// Carries one signal through the whole pipeline.
    ///
    /// Every outcome, including rejection, is reported in the response.
    pub async fn handle_signal(&self, signal: TradeSignal, options: ExecutionOptions) -> ExecutionResponse {
        let _guard = self.symbol_locks.acquire(&signal.symbol).await;
        tracing::info!(
            symbol = %signal.symbol,
            action = %signal.action,
            confidence = signal.confidence,
            strategy_id = %signal.strategy_id,
            "Received trade signal."
        );

        let portfolio = self.portfolio().await;
        let market_price = self.market_price(&signal.symbol, options.exchange.as_deref()).await;
        let decision = self.risk.read().await.evaluate_trade(&signal, market_price, &portfolio);
        if !decision.approved {
            return self.reject(signal, decision.reason);
        }
        let approved = decision.modified_signal.unwrap_or_else(|| signal.clone());

        let order = match approved.action {
            TradeAction::Close => match closing_order(&approved, &portfolio, market_price) {
                Some(order) => order,
                None => {
                    let reason = format!("No open position in {} to close", approved.symbol);
                    return self.reject(signal, reason);
                }
            },
            TradeAction::Buy | TradeAction::Sell => approved.clone(),
        };

        let result = self.executor.execute_trade(&order, &options).await;
        self.metrics.lock().await.record(&result, result.strategy);

        if result.has_fill() {
            self.apply_fill(&approved, &result).await;
        }

        let _ = self.events.send(PipelineEvent::TradeExecuted(TradeExecuted {
            symbol: approved.symbol.clone(),
            result: result.clone(),
        }));
        let key = result
            .order_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", approved.symbol, result.timestamp.timestamp_millis()));
        self.checkpoint(categories::EXECUTION_RESULTS, &key, &result).await;

        ExecutionResponse::executed(signal, result)
    }

    async fn apply_fill(&self, approved: &TradeSignal, result: &ExecutionResult) {
        let (Some(price), Some(quantity)) = (result.executed_price, result.executed_quantity) else {
            return;
        };
        let fill = TradeFill {
            symbol: approved.symbol.clone(),
            action: approved.action,
            price,
            quantity,
            direction: approved.action.implied_direction(),
        };
        let state = self.ledger.lock().await.update_portfolio(&fill).clone();

        tracing::info!(
            symbol = %fill.symbol,
            action = %fill.action,
            total_value = %state.total_value,
            exposure = %state.current_exposure,
            drawdown = %state.current_drawdown,
            "Portfolio updated."
        );
        let _ = self.events.send(PipelineEvent::PortfolioUpdate(PortfolioUpdate::from(&state)));
        self.checkpoint(categories::PORTFOLIO_STATE, PORTFOLIO_KEY, &state).await;
    }

    fn reject(&self, signal: TradeSignal, reason: String) -> ExecutionResponse {
        tracing::warn!(symbol = %signal.symbol, action = %signal.action, %reason, "Signal rejected.");
        let _ = self.events.send(PipelineEvent::SignalRejected(SignalRejected {
            symbol: signal.symbol.clone(),
            reason: reason.clone(),
            timestamp: Utc::now(),
        }));
        ExecutionResponse::rejected(signal, reason)
    }

    async fn market_price(&self, symbol: &Symbol, exchange: Option<&str>) -> Option<Decimal> {
        match self.executor.market_data(symbol, exchange).await {
            Ok(data) => Some(data.mid()).filter(|p| *p > Decimal::ZERO),
            Err(e) => {
                tracing::debug!(%symbol, error = %e, "No market price available.");
                None
            }
        }
    }

    /// Persistence is best-effort: failures are logged and the pipeline moves on.
    async fn checkpoint<T: serde::Serialize + Sync>(&self, category: &str, key: &str, value: &T) {
        if let Err(e) = store::store_json(self.store.as_ref(), category, key, value).await {
            tracing::warn!(category, key, error = %e, "Failed to write checkpoint.");
        }
    }
}

/// Builds the opposing order that flattens the open position in the
/// signal's symbol.
fn closing_order(
    signal: &TradeSignal,
    portfolio: &PortfolioState,
    market_price: Option<Decimal>,
) -> Option<TradeSignal> {
    let position = portfolio.position(&signal.symbol)?;
    let action = match position.direction {
        Direction::Long => TradeAction::Sell,
        Direction::Short => TradeAction::Buy,
    };
    let entry_price = signal
        .params
        .entry_price
        .filter(|p| *p > Decimal::ZERO)
        .or(market_price)
        .unwrap_or(position.average_price);

    let mut order = signal.clone();
    order.action = action;
    order.params.entry_price = Some(entry_price);
    order.params.position_size = Some(position.quantity);
    Some(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Position;
    use rust_decimal_macros::dec;

    fn portfolio_with(direction: Direction) -> PortfolioState {
        let mut portfolio = PortfolioState::new(dec!(100000));
        let symbol = Symbol::new("BTC-USD");
        portfolio
            .positions
            .insert(symbol.clone(), Position::new(symbol, direction, dec!(2), dec!(45000)));
        portfolio
    }

    #[test]
    fn closing_a_long_sells_the_full_quantity() {
        let signal = TradeSignal::new(TradeAction::Close, Symbol::new("BTC-USD"), 1.0);
        let order = closing_order(&signal, &portfolio_with(Direction::Long), Some(dec!(50000))).unwrap();
        assert_eq!(order.action, TradeAction::Sell);
        assert_eq!(order.params.position_size, Some(dec!(2)));
        assert_eq!(order.params.entry_price, Some(dec!(50000)));
    }

    #[test]
    fn closing_a_short_buys_and_falls_back_to_average_price() {
        let signal = TradeSignal::new(TradeAction::Close, Symbol::new("BTC-USD"), 1.0);
        let order = closing_order(&signal, &portfolio_with(Direction::Short), None).unwrap();
        assert_eq!(order.action, TradeAction::Buy);
        assert_eq!(order.params.entry_price, Some(dec!(45000)));
    }

    #[test]
    fn nothing_to_close_without_a_position() {
        let signal = TradeSignal::new(TradeAction::Close, Symbol::new("ETH-USD"), 1.0);
        assert!(closing_order(&signal, &portfolio_with(Direction::Long), None).is_none());
    }
}
