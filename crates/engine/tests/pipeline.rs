// In crates/engine/tests/pipeline.rs

use app_config::Settings;
use async_trait::async_trait;
use core_types::{Direction, ExecutionOptions, ExecutionStrategy, Symbol, TradeAction, TradeSignal};
use engine::TradingEngine;
use events::{InboundMessage, OutboundMessage, PipelineEvent};
use execution::{OrderExecutor, SimulatedExchange, SimulationSettings};
use risk::RiskParameters;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use store::{InMemoryStore, KnowledgeStore, categories};

fn btc() -> Symbol {
    Symbol::new("BTC-USD")
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.execution.default_exchange = "sim".to_string();
    settings.execution.default_strategy = ExecutionStrategy::Market;
    settings.execution.retry_delay_ms = 0;
    settings.execution.limit_fill_wait_ms = 0;
    settings.execution.iceberg_chunk_delay_ms = 0;
    settings.risk.max_position_size = dec!(0.5);
    settings
}

struct Harness {
    engine: Arc<TradingEngine>,
    exchange: Arc<SimulatedExchange>,
    store: Arc<InMemoryStore>,
}

fn harness() -> Harness {
    harness_with(settings())
}

fn harness_with(settings: Settings) -> Harness {
    let exchange = Arc::new(SimulatedExchange::new("sim", SimulationSettings::default()));
    exchange.set_market(&btc(), dec!(49990), dec!(50010), dec!(1000000));

    let executor = OrderExecutor::new(settings.execution.clone());
    executor.register_exchange(exchange.clone());

    let store = Arc::new(InMemoryStore::new());
    let engine = TradingEngine::new(&settings, Arc::new(executor), store.clone()).unwrap();
    Harness {
        engine: Arc::new(engine),
        exchange,
        store,
    }
}

fn buy() -> TradeSignal {
    TradeSignal::new(TradeAction::Buy, btc(), 0.9)
        .with_entry_price(dec!(50000))
        .with_stop_loss(dec!(48500))
        .with_strategy_id("momentum")
}

#[tokio::test]
async fn approved_buy_fills_and_opens_a_position() {
    let h = harness();
    let response = h.engine.handle_signal(buy(), ExecutionOptions::default()).await;

    assert!(response.success, "{:?}", response.reason);
    let result = response.execution_result.unwrap();
    assert_eq!(result.executed_price, Some(dec!(50010)));
    assert_eq!(result.slippage, Some(dec!(0.0002)));
    assert_eq!(result.strategy, ExecutionStrategy::Market);

    let quantity = result.executed_quantity.unwrap();
    assert!((quantity - dec!(0.6667)).abs() < dec!(0.001), "quantity = {quantity}");

    let portfolio = h.engine.portfolio().await;
    let position = portfolio.position(&btc()).unwrap();
    assert_eq!(position.direction, Direction::Long);
    assert_eq!(position.quantity, quantity);
    let expected_exposure = quantity * dec!(50010) / dec!(100000);
    assert!((portfolio.current_exposure - expected_exposure).abs() < dec!(0.000001));
}

#[tokio::test]
async fn second_buy_on_the_same_symbol_is_rejected() {
    let h = harness();
    assert!(h.engine.handle_signal(buy(), ExecutionOptions::default()).await.success);

    let response = h.engine.handle_signal(buy(), ExecutionOptions::default()).await;
    assert!(!response.success);
    assert!(response.execution_result.is_none());
    assert!(response.reason.unwrap().contains("Already have a long position"));
    assert_eq!(h.exchange.execute_calls(), 1);
}

#[tokio::test]
async fn concurrent_signals_on_one_symbol_open_a_single_position() {
    let h = harness();
    let first = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.handle_signal(buy(), ExecutionOptions::default()).await })
    };
    let second = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.handle_signal(buy(), ExecutionOptions::default()).await })
    };
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert_eq!([first.success, second.success].iter().filter(|s| **s).count(), 1);
    assert_eq!(h.exchange.execute_calls(), 1);
    assert_eq!(h.engine.portfolio().await.positions.len(), 1);
}

#[tokio::test]
async fn close_sells_the_position_and_books_the_profit() {
    let h = harness();
    let opened = h.engine.handle_signal(buy(), ExecutionOptions::default()).await;
    let quantity = opened.execution_result.unwrap().executed_quantity.unwrap();

    h.exchange.set_price(&btc(), dec!(55000));
    let close = TradeSignal::new(TradeAction::Close, btc(), 1.0);
    let response = h.engine.handle_signal(close, ExecutionOptions::default()).await;
    assert!(response.success, "{:?}", response.reason);

    let result = response.execution_result.unwrap();
    assert_eq!(result.executed_quantity, Some(quantity));
    let exit = result.executed_price.unwrap();
    assert!(exit < dec!(55000));

    let portfolio = h.engine.portfolio().await;
    assert!(portfolio.positions.is_empty());
    assert_eq!(portfolio.total_value, dec!(100000) + (exit - dec!(50010)) * quantity);
    assert_eq!(portfolio.high_water_mark, portfolio.total_value);
    assert_eq!(portfolio.current_drawdown, Decimal::ZERO);
    assert_eq!(portfolio.current_exposure, Decimal::ZERO);
}

#[tokio::test]
async fn smaller_opposing_sell_only_trims_the_long() {
    let h = harness();
    let opened = h.engine.handle_signal(buy(), ExecutionOptions::default()).await;
    let held = opened.execution_result.unwrap().executed_quantity.unwrap();

    let sell = TradeSignal::new(TradeAction::Sell, btc(), 0.6)
        .with_entry_price(dec!(50000))
        .with_position_size(dec!(0.1));
    let response = h.engine.handle_signal(sell, ExecutionOptions::default()).await;
    assert!(response.success, "{:?}", response.reason);
    let result = response.execution_result.unwrap();
    assert_eq!(result.executed_quantity, Some(dec!(0.1)));
    assert_eq!(result.executed_price, Some(dec!(49990)));

    let portfolio = h.engine.portfolio().await;
    let position = portfolio.position(&btc()).unwrap();
    assert_eq!(position.direction, Direction::Long);
    assert_eq!(position.quantity, held - dec!(0.1));
    assert_eq!(position.average_price, dec!(50010));
    assert_eq!(portfolio.total_value, dec!(100000) + (dec!(49990) - dec!(50010)) * dec!(0.1));
}

#[tokio::test]
async fn partially_filled_close_keeps_the_unsold_remainder() {
    let h = harness();
    let opened = h.engine.handle_signal(buy(), ExecutionOptions::default()).await;
    let held = opened.execution_result.unwrap().executed_quantity.unwrap();

    h.exchange.fail_next(1);
    let close = TradeSignal::new(TradeAction::Close, btc(), 1.0);
    let options = ExecutionOptions {
        strategy: Some(ExecutionStrategy::Iceberg),
        ..ExecutionOptions::default()
    };
    let response = h.engine.handle_signal(close, options).await;
    assert!(!response.success);

    let result = response.execution_result.unwrap();
    let sold = result.executed_quantity.unwrap();
    assert!(sold > Decimal::ZERO && sold < held, "sold = {sold}");
    let exit = result.executed_price.unwrap();

    let portfolio = h.engine.portfolio().await;
    let position = portfolio.position(&btc()).unwrap();
    assert_eq!(position.quantity, held - sold);
    assert_eq!(position.average_price, dec!(50010));
    assert_eq!(portfolio.total_value, dec!(100000) + (exit - dec!(50010)) * sold);
}

#[tokio::test]
async fn close_without_a_position_never_reaches_the_exchange() {
    let h = harness();
    let close = TradeSignal::new(TradeAction::Close, btc(), 1.0);
    let response = h.engine.handle_signal(close, ExecutionOptions::default()).await;

    assert!(!response.success);
    assert!(response.reason.unwrap().contains("No open position"));
    assert_eq!(h.exchange.execute_calls(), 0);
    assert_eq!(h.engine.metrics_summary().await.total_orders, 0);
}

#[tokio::test]
async fn poor_risk_reward_is_rejected_and_broadcast() {
    let h = harness();
    let mut events = h.engine.subscribe();
    let signal = buy().with_stop_loss(dec!(49000)).with_take_profit(dec!(50500));

    let response = h.engine.handle_signal(signal, ExecutionOptions::default()).await;
    assert!(!response.success);
    assert!(response.reason.unwrap().contains("risk/reward"));

    match events.recv().await.unwrap() {
        PipelineEvent::SignalRejected(rejected) => assert_eq!(rejected.symbol, btc()),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(h.exchange.execute_calls(), 0);
}

#[tokio::test]
async fn fills_publish_trade_and_portfolio_events() {
    let h = harness();
    let mut events = h.engine.subscribe();
    assert!(h.engine.handle_signal(buy(), ExecutionOptions::default()).await.success);

    assert!(matches!(events.recv().await.unwrap(), PipelineEvent::PortfolioUpdate(u) if u.open_positions == 1));
    assert!(matches!(events.recv().await.unwrap(), PipelineEvent::TradeExecuted(t) if t.result.success));
}

#[tokio::test]
async fn exhausted_retries_leave_the_ledger_untouched() {
    let h = harness();
    h.exchange.fail_next(3);
    let options = ExecutionOptions {
        retry_attempts: Some(3),
        ..ExecutionOptions::default()
    };

    let response = h.engine.handle_signal(buy(), options).await;
    assert!(!response.success);
    assert!(response.reason.unwrap().starts_with("Failed after 3 attempt(s)"));
    assert_eq!(h.exchange.execute_calls(), 3);
    assert!(h.engine.portfolio().await.positions.is_empty());

    let metrics = h.engine.metrics_summary().await;
    assert_eq!(metrics.total_orders, 1);
    assert_eq!(metrics.failed_orders, 1);
    assert_eq!(metrics.success_rate, 0.0);
}

#[tokio::test]
async fn metrics_track_successes_per_strategy() {
    let h = harness();
    assert!(h.engine.handle_signal(buy(), ExecutionOptions::default()).await.success);

    let metrics = h.engine.metrics_summary().await;
    assert_eq!(metrics.successful_orders, 1);
    assert_eq!(metrics.success_rate, 1.0);
    assert_eq!(metrics.by_strategy[&ExecutionStrategy::Market].total_orders, 1);
    assert_eq!(metrics.recent_executions.len(), 1);

    h.engine.reset_metrics().await;
    assert_eq!(h.engine.metrics_summary().await.total_orders, 0);
}

#[tokio::test]
async fn fills_are_checkpointed_and_can_be_restored() {
    let h = harness();
    assert!(h.engine.handle_signal(buy(), ExecutionOptions::default()).await.success);
    assert!(h.store.get(categories::PORTFOLIO_STATE, "current").await.unwrap().is_some());
    assert_eq!(h.store.len(categories::EXECUTION_RESULTS).await, 1);

    let restored = TradingEngine::new(&settings(), Arc::new(OrderExecutor::new(settings().execution)), h.store.clone()).unwrap();
    assert!(restored.restore_portfolio().await.unwrap());
    assert_eq!(restored.portfolio().await, h.engine.portfolio().await);
}

struct BrokenStore;

#[async_trait]
impl KnowledgeStore for BrokenStore {
    async fn store(&self, _category: &str, _key: &str, _data: serde_json::Value) -> store::Result<()> {
        Err(store::Error::Unavailable("disk full".to_string()))
    }

    async fn get(&self, _category: &str, _key: &str) -> store::Result<Option<serde_json::Value>> {
        Err(store::Error::Unavailable("disk full".to_string()))
    }
}

#[tokio::test]
async fn checkpoint_failures_do_not_fail_the_trade() {
    let settings = settings();
    let exchange = Arc::new(SimulatedExchange::new("sim", SimulationSettings::default()));
    exchange.set_market(&btc(), dec!(49990), dec!(50010), dec!(1000000));
    let executor = OrderExecutor::new(settings.execution.clone());
    executor.register_exchange(exchange);
    let engine = TradingEngine::new(&settings, Arc::new(executor), Arc::new(BrokenStore)).unwrap();

    assert!(engine.handle_signal(buy(), ExecutionOptions::default()).await.success);
    assert_eq!(engine.portfolio().await.positions.len(), 1);
    assert!(engine.restore_portfolio().await.is_err());
}

#[tokio::test]
async fn risk_parameters_update_is_validated_and_checkpointed() {
    let h = harness();
    let invalid = RiskParameters {
        max_drawdown: dec!(2),
        ..RiskParameters::default()
    };
    assert!(h.engine.update_risk_parameters(invalid).await.is_err());
    assert_eq!(h.engine.risk_parameters().await.max_position_size, dec!(0.5));

    let tighter = RiskParameters {
        max_total_exposure: dec!(0.3),
        ..RiskParameters::default()
    };
    h.engine.update_risk_parameters(tighter.clone()).await.unwrap();
    assert_eq!(h.engine.risk_parameters().await, tighter);
    let saved: Option<RiskParameters> =
        store::get_json(h.store.as_ref(), categories::RISK_PARAMETERS, "current").await.unwrap();
    assert_eq!(saved, Some(tighter));
}

#[tokio::test]
async fn unknown_exchange_is_provisioned_from_the_entry_price() {
    let h = harness();
    let signal = TradeSignal::new(TradeAction::Sell, Symbol::new("ETH-USD"), 0.7).with_entry_price(dec!(2000));
    let options = ExecutionOptions {
        exchange: Some("paper".to_string()),
        ..ExecutionOptions::default()
    };

    let response = h.engine.handle_signal(signal, options).await;
    assert!(response.success, "{:?}", response.reason);
    let position = h.engine.portfolio().await.positions[&Symbol::new("ETH-USD")].clone();
    assert_eq!(position.direction, Direction::Short);
}

#[tokio::test]
async fn dry_run_evaluation_does_not_trade() {
    let h = harness();
    let decision = h.engine.evaluate(&buy(), &ExecutionOptions::default()).await;
    assert!(decision.approved);
    assert!(decision.modified_signal.unwrap().params.position_size.is_some());
    assert_eq!(h.exchange.execute_calls(), 0);
}

#[tokio::test]
async fn mailbox_serves_messages_until_shutdown() {
    let h = harness();
    let (handle, task) = engine::spawn(Arc::clone(&h.engine), 16);

    let message = InboundMessage::TradeExecution {
        signal: buy(),
        params: None,
    };
    let OutboundMessage::ExecutionResponse(response) = handle.submit(message).await.unwrap();
    assert!(response.success);
    assert_eq!(response.original_signal, buy());

    assert_eq!(handle.portfolio().await.unwrap().positions.len(), 1);
    assert_eq!(handle.metrics().await.unwrap().total_orders, 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    assert!(matches!(handle.portfolio().await, Err(engine::Error::MailboxClosed)));
}

#[tokio::test]
async fn json_messages_round_through_the_mailbox() {
    let h = harness();
    let (handle, task) = engine::spawn(Arc::clone(&h.engine), 4);

    let raw = r#"{"type":"trade_execution","signal":{"action":"BUY","symbol":"BTC-USD","confidence":0.9,"params":{"entryPrice":50000,"stopLoss":48500}},"params":{"strategy":"market","retryAttempts":1}}"#;
    let message: InboundMessage = serde_json::from_str(raw).unwrap();
    let reply = handle.submit(message).await.unwrap();

    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["type"], "execution_response");
    assert_eq!(json["success"], true);
    assert_eq!(json["executionResult"]["strategy"], "market");

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}
