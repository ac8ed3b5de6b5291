// In crates/events/src/lib.rs

use chrono::{DateTime, Utc};
use core_types::{ExecutionOptions, ExecutionResult, PortfolioState, Symbol, TradeSignal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// --- Pipeline messages ---

/// A request entering the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    TradeExecution {
        signal: TradeSignal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<ExecutionOptions>,
    },
}

/// The reply to one [`InboundMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub success: bool,
    pub original_signal: TradeSignal,
    /// Absent when the signal never reached the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<ExecutionResult>,
    /// Why the signal was rejected or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResponse {
    pub fn rejected(signal: TradeSignal, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            original_signal: signal,
            execution_result: None,
            reason: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn executed(signal: TradeSignal, result: ExecutionResult) -> Self {
        Self {
            success: result.success,
            reason: result.error.clone(),
            original_signal: signal,
            execution_result: Some(result),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ExecutionResponse(ExecutionResponse),
}

// --- Broadcast events ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRejected {
    pub symbol: Symbol,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeExecuted {
    pub symbol: Symbol,
    pub result: ExecutionResult,
}

/// The ledger after a fill was applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioUpdate {
    pub total_value: Decimal,
    pub current_exposure: Decimal,
    pub current_drawdown: Decimal,
    pub open_positions: usize,
}

impl From<&PortfolioState> for PortfolioUpdate {
    fn from(state: &PortfolioState) -> Self {
        Self {
            total_value: state.total_value,
            current_exposure: state.current_exposure,
            current_drawdown: state.current_drawdown,
            open_positions: state.positions.len(),
        }
    }
}

/// Fan-out notifications for observers of the pipeline.
/// `tag` and `content` keep the JSON flat for consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum PipelineEvent {
    SignalRejected(SignalRejected),
    TradeExecuted(TradeExecuted),
    PortfolioUpdate(PortfolioUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::TradeAction;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_trade_execution_without_params() {
        let raw = r#"{"type":"trade_execution","signal":{"action":"BUY","symbol":"ETH-USD","confidence":0.8,"params":{"entryPrice":2000}}}"#;
        let InboundMessage::TradeExecution { signal, params } = serde_json::from_str(raw).unwrap();
        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.params.entry_price, Some(dec!(2000)));
        assert!(params.is_none());
    }

    #[test]
    fn rejection_response_carries_reason_but_no_result() {
        let signal = TradeSignal::new(TradeAction::Sell, Symbol::new("ETH-USD"), 0.5);
        let message = OutboundMessage::ExecutionResponse(ExecutionResponse::rejected(signal, "nope"));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "execution_response");
        assert_eq!(json["success"], false);
        assert_eq!(json["reason"], "nope");
        assert_eq!(json["originalSignal"]["symbol"], "ETH-USD");
        assert!(json.get("executionResult").is_none());
    }

    #[test]
    fn pipeline_events_use_type_and_payload() {
        let event = PipelineEvent::PortfolioUpdate(PortfolioUpdate::from(&PortfolioState::new(dec!(1000))));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PortfolioUpdate");
        assert_eq!(json["payload"]["openPositions"], 0);
    }
}
