// In crates/execution/src/executor.rs

use crate::exchange::ExchangeClient;
use crate::router::{ExecutionRouter, MarketConditions};
use crate::simulated::SimulatedExchange;
use crate::types::{ExecutionSettings, MarketData, OrderRequest, OrderType};
use crate::{Error, Executor, Result};
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    ExecutionOptions, ExecutionResult, ExecutionStrategy, Side, Symbol, TradeAction, TradeSignal,
};
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A validated, executable view of a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub slippage_tolerance: Decimal,
    pub expire_after_seconds: u64,
    pub time_in_force: Option<String>,
}

/// Turns approved signals into fills using market, limit, smart or iceberg
/// execution, with bounded retries.
///
/// Exchanges are looked up by name. A name with no registered client gets an
/// in-memory [`SimulatedExchange`] so the pipeline never stalls on missing
/// infrastructure.
pub struct OrderExecutor {
    settings: ExecutionSettings,
    router: ExecutionRouter,
    exchanges: Mutex<HashMap<String, Arc<dyn ExchangeClient>>>,
    provisioned: Mutex<HashMap<String, Arc<SimulatedExchange>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OrderExecutor {
    pub fn new(settings: ExecutionSettings) -> Self {
        if let Some(threshold) = settings.circuit_breaker_threshold {
            tracing::warn!(%threshold, "circuit_breaker_threshold is configured but not enforced.");
        }
        Self {
            router: ExecutionRouter::new(settings.routing.clone()),
            settings,
            exchanges: Mutex::new(HashMap::new()),
            provisioned: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub fn router(&self) -> &ExecutionRouter {
        &self.router
    }

    /// Registers `client` under its own name, replacing any previous client.
    pub fn register_exchange(&self, client: Arc<dyn ExchangeClient>) {
        let name = client.name().to_string();
        tracing::info!(exchange = %name, "Registered exchange client.");
        lock(&self.exchanges).insert(name, client);
    }

    /// Resolves an exchange by name, provisioning a simulated one if needed.
    ///
    /// `seed` gives a provisioned venue a starting price for the symbol about
    /// to be traded.
    pub fn exchange(&self, name: Option<&str>, seed: Option<(&Symbol, Decimal)>) -> Arc<dyn ExchangeClient> {
        let name = name.unwrap_or(self.settings.default_exchange.as_str());
        if let Some(client) = lock(&self.exchanges).get(name) {
            return Arc::clone(client);
        }

        let simulated = {
            let mut provisioned = lock(&self.provisioned);
            Arc::clone(provisioned.entry(name.to_string()).or_insert_with(|| {
                tracing::warn!(exchange = %name, "No exchange registered; provisioning a simulated exchange.");
                Arc::new(SimulatedExchange::new(name, self.settings.simulation.clone()))
            }))
        };
        if let Some((symbol, price)) = seed.filter(|(_, p)| *p > Decimal::ZERO) {
            simulated.ensure_market(symbol, price);
        }
        simulated
    }

    /// Executes a signal end to end, retrying failed attempts.
    ///
    /// Never returns an error: validation failures and exhausted retries are
    /// both reported as a failed [`ExecutionResult`].
    pub async fn execute_trade(&self, signal: &TradeSignal, options: &ExecutionOptions) -> ExecutionResult {
        let started = Instant::now();
        let requested = options
            .strategy
            .or(signal.params.order_type)
            .unwrap_or(self.settings.default_strategy);

        let plan = match validate_signal(signal, options, &self.settings) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(symbol = %signal.symbol, error = %e, "Signal rejected before dispatch.");
                return finish(ExecutionResult::failure(requested, e.to_string()), started);
            }
        };

        let exchange = self.exchange(options.exchange.as_deref(), Some((&plan.symbol, plan.entry_price)));
        let strategy = match requested {
            ExecutionStrategy::Smart => self.route(exchange.as_ref(), signal).await,
            other => other,
        };

        let attempts = options.retry_attempts.unwrap_or(self.settings.retry_attempts).max(1);
        let delay = Duration::from_millis(options.retry_delay_ms.unwrap_or(self.settings.retry_delay_ms));

        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.dispatch(exchange.as_ref(), strategy, &plan).await {
                Ok(result) => {
                    tracing::info!(
                        symbol = %plan.symbol,
                        %strategy,
                        attempt,
                        success = result.success,
                        price = ?result.executed_price,
                        quantity = ?result.executed_quantity,
                        "Trade executed."
                    );
                    return finish(result, started);
                }
                Err(e) if !e.is_retryable() => {
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(symbol = %plan.symbol, %strategy, attempt, attempts, error = %e, "Execution attempt failed.");
                    last_error = Some(e);
                    if attempt < attempts && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let reason = last_error.map_or_else(|| "no attempt was made".to_string(), |e| e.to_string());
        tracing::error!(symbol = %plan.symbol, %strategy, attempts, error = %reason, "Trade failed.");
        finish(
            ExecutionResult::failure(strategy, format!("Failed after {attempts} attempt(s): {reason}")),
            started,
        )
    }

    /// Resolves `smart` execution to a concrete strategy.
    async fn route(&self, exchange: &dyn ExchangeClient, signal: &TradeSignal) -> ExecutionStrategy {
        let data = match exchange.get_market_data(&signal.symbol).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(symbol = %signal.symbol, error = %e, "No market data for routing; using market execution.");
                return ExecutionStrategy::Market;
            }
        };
        let settings = self.router.settings();
        let history = exchange
            .recent_prices(&signal.symbol, settings.volatility_lookback)
            .await
            .unwrap_or_default();
        let conditions = MarketConditions::from_market_data(&data, &history, settings.default_volatility);
        self.router.select_strategy(signal, &conditions)
    }

    async fn dispatch(
        &self,
        exchange: &dyn ExchangeClient,
        strategy: ExecutionStrategy,
        plan: &OrderPlan,
    ) -> Result<ExecutionResult> {
        match strategy {
            ExecutionStrategy::Market | ExecutionStrategy::Smart => {
                self.execute_market(exchange, plan, plan.quantity).await
            }
            ExecutionStrategy::Limit => self.execute_limit(exchange, plan).await,
            ExecutionStrategy::Iceberg => self.execute_iceberg(exchange, plan).await,
        }
    }

    async fn execute_market(
        &self,
        exchange: &dyn ExchangeClient,
        plan: &OrderPlan,
        quantity: Decimal,
    ) -> Result<ExecutionResult> {
        let quote = exchange.get_market_data(&plan.symbol).await?;
        check_slippage_tolerance(plan, &quote)?;

        let order = OrderRequest {
            symbol: plan.symbol.clone(),
            side: plan.side,
            quantity,
            order_type: OrderType::Market,
            reference_price: plan.entry_price,
            time_in_force: plan.time_in_force.clone(),
        };
        let fill = exchange.execute_order(&order).await?;
        if !fill.success {
            return Err(Error::ExecutionFailed {
                reason: format!("exchange did not fill order {}", fill.order_id),
            });
        }

        let slippage = calculate_slippage(plan.side, plan.entry_price, fill.executed_price);
        Ok(self.filled(ExecutionStrategy::Market, fill.order_id, fill.executed_price, fill.executed_quantity, slippage))
    }

    async fn execute_limit(&self, exchange: &dyn ExchangeClient, plan: &OrderPlan) -> Result<ExecutionResult> {
        let offset = self.settings.limit_price_offset;
        let limit_price = match plan.side {
            Side::Buy => plan.entry_price * (Decimal::ONE - offset),
            Side::Sell => plan.entry_price * (Decimal::ONE + offset),
        };

        let quote = exchange.get_market_data(&plan.symbol).await?;
        let marketable = match plan.side {
            Side::Buy => quote.ask <= limit_price,
            Side::Sell => quote.bid >= limit_price,
        };

        if !marketable {
            if self.settings.limit_fill_wait_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.limit_fill_wait_ms)).await;
            }
            let probability = match self.settings.limit_fill_probability {
                p if p.is_finite() => p.clamp(0.0, 1.0),
                _ => 0.0,
            };
            let filled = rand::thread_rng().gen_bool(probability);
            if !filled {
                return Err(Error::LimitExpired { seconds: plan.expire_after_seconds });
            }
        }

        let order = OrderRequest {
            symbol: plan.symbol.clone(),
            side: plan.side,
            quantity: plan.quantity,
            order_type: OrderType::Limit { price: limit_price },
            reference_price: limit_price,
            time_in_force: plan.time_in_force.clone(),
        };
        let fill = exchange.execute_order(&order).await?;
        if !fill.success {
            return Err(Error::ExecutionFailed {
                reason: format!("exchange did not fill limit order {}", fill.order_id),
            });
        }

        let slippage = calculate_slippage(plan.side, limit_price, fill.executed_price);
        Ok(self.filled(ExecutionStrategy::Limit, fill.order_id, fill.executed_price, fill.executed_quantity, slippage))
    }

    /// Works the order as equal child market orders with a pause between
    /// them. A partial fill is returned as a failed result carrying the
    /// filled quantity; only a complete miss is an error, so retries never
    /// re-buy filled chunks.
    async fn execute_iceberg(&self, exchange: &dyn ExchangeClient, plan: &OrderPlan) -> Result<ExecutionResult> {
        let chunks = split_iceberg(plan.quantity, self.settings.iceberg_chunks);
        let delay = Duration::from_millis(self.settings.iceberg_chunk_delay_ms);

        let mut filled_quantity = Decimal::ZERO;
        let mut filled_notional = Decimal::ZERO;
        let mut order_ids = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.execute_market(exchange, plan, *chunk).await {
                Ok(child) => {
                    if let (Some(price), Some(quantity)) = (child.executed_price, child.executed_quantity) {
                        filled_quantity += quantity;
                        filled_notional += price * quantity;
                    }
                    order_ids.extend(child.order_id);
                }
                Err(e) => {
                    tracing::warn!(symbol = %plan.symbol, chunk = index + 1, error = %e, "Iceberg chunk failed.");
                    failures.push(format!("chunk {}: {}", index + 1, e));
                }
            }
        }

        if filled_quantity.is_zero() {
            return Err(Error::ExecutionFailed {
                reason: format!("all {} iceberg chunks failed ({})", chunks.len(), failures.join("; ")),
            });
        }

        let average_price = filled_notional / filled_quantity;
        let slippage = calculate_slippage(plan.side, plan.entry_price, average_price);
        let mut result = self.filled(
            ExecutionStrategy::Iceberg,
            order_ids.join(","),
            average_price,
            filled_quantity,
            slippage,
        );
        if !failures.is_empty() {
            result.success = false;
            result.error = Some(format!(
                "{} of {} iceberg chunks failed: {}",
                failures.len(),
                chunks.len(),
                failures.join("; ")
            ));
        }
        Ok(result)
    }

    fn filled(
        &self,
        strategy: ExecutionStrategy,
        order_id: String,
        price: Decimal,
        quantity: Decimal,
        slippage: Decimal,
    ) -> ExecutionResult {
        ExecutionResult {
            success: true,
            order_id: Some(order_id),
            executed_price: Some(price),
            executed_quantity: Some(quantity),
            slippage: Some(slippage),
            transaction_cost: Some(price * quantity * self.settings.fee_rate),
            error: None,
            timestamp: Utc::now(),
            strategy,
            execution_time: 0,
        }
    }
}

#[async_trait]
impl Executor for OrderExecutor {
    fn name(&self) -> &'static str {
        "OrderExecutor"
    }

    async fn execute_trade(&self, signal: &TradeSignal, options: &ExecutionOptions) -> ExecutionResult {
        OrderExecutor::execute_trade(self, signal, options).await
    }

    async fn market_data(&self, symbol: &Symbol, exchange: Option<&str>) -> Result<MarketData> {
        self.exchange(exchange, None).get_market_data(symbol).await
    }
}

fn finish(mut result: ExecutionResult, started: Instant) -> ExecutionResult {
    result.execution_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    result
}

/// Relative price difference, signed so that a positive value is always
/// adverse: paying up on a buy, or selling below expectation.
pub fn calculate_slippage(side: Side, expected: Decimal, executed: Decimal) -> Decimal {
    if expected <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let raw = (executed - expected) / expected;
    match side {
        Side::Buy => raw,
        Side::Sell => -raw,
    }
}

/// Splits `total` into `chunks` equal parts; the last part absorbs any
/// rounding remainder so the parts always sum to `total`.
pub fn split_iceberg(total: Decimal, chunks: u32) -> Vec<Decimal> {
    let chunks = chunks.max(1);
    let part = total / Decimal::from(chunks);
    let mut parts = vec![part; chunks as usize - 1];
    parts.push(total - part * Decimal::from(chunks - 1));
    parts
}

fn check_slippage_tolerance(plan: &OrderPlan, quote: &MarketData) -> Result<()> {
    let quoted = quote.touch(plan.side);
    let deviation = calculate_slippage(plan.side, plan.entry_price, quoted);
    if deviation > plan.slippage_tolerance {
        return Err(Error::SlippageExceeded {
            quoted,
            deviation,
            tolerance: plan.slippage_tolerance,
        });
    }
    Ok(())
}

/// Schema checks run before any exchange is contacted.
pub fn validate_signal(
    signal: &TradeSignal,
    options: &ExecutionOptions,
    settings: &ExecutionSettings,
) -> Result<OrderPlan> {
    if signal.symbol.as_str().trim().is_empty() {
        return Err(Error::Validation("symbol is empty".to_string()));
    }
    let side = match signal.action {
        TradeAction::Buy => Side::Buy,
        TradeAction::Sell => Side::Sell,
        TradeAction::Close => {
            return Err(Error::Validation(
                "CLOSE must be resolved to a BUY or SELL against the open position".to_string(),
            ));
        }
    };

    let entry_price = signal
        .params
        .entry_price
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| Error::Validation("entry price is missing or not positive".to_string()))?;
    let quantity = signal
        .params
        .position_size
        .filter(|q| *q > Decimal::ZERO)
        .ok_or_else(|| Error::Validation("position size is missing or not positive".to_string()))?;

    if let Some(limit) = settings.order_size_limit {
        let notional = quantity * entry_price;
        if notional > limit {
            return Err(Error::Validation(format!(
                "order notional {notional} exceeds the order size limit {limit}"
            )));
        }
    }

    let slippage_tolerance = options
        .slippage_tolerance
        .or(signal.params.slippage_tolerance)
        .unwrap_or(settings.slippage_tolerance);
    if slippage_tolerance < Decimal::ZERO {
        return Err(Error::Validation(format!(
            "slippage tolerance {slippage_tolerance} is negative"
        )));
    }

    Ok(OrderPlan {
        symbol: signal.symbol.clone(),
        side,
        quantity,
        entry_price,
        slippage_tolerance,
        expire_after_seconds: signal.params.expire_after.unwrap_or(settings.expire_after_seconds),
        time_in_force: signal.params.time_in_force.clone(),
    })
}
