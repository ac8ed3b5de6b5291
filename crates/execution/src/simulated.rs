// In crates/execution/src/simulated.rs

use crate::exchange::ExchangeClient;
use crate::types::{
    AccountBalance, MarketData, OrderFill, OrderRequest, OrderState, OrderStatus, OrderType,
    SimulationSettings,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use core_types::{Side, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of traded prices each simulated market remembers.
const PRICE_HISTORY_SIZE: usize = 200;

#[derive(Debug, Clone)]
struct SimMarket {
    bid: Decimal,
    ask: Decimal,
    last: Decimal,
    volume: Decimal,
    history: VecDeque<Decimal>,
}

impl SimMarket {
    fn record_trade(&mut self, price: Decimal) {
        self.last = price;
        self.history.push_back(price);
        if self.history.len() > PRICE_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

/// An in-memory venue that fills every order against a configurable book.
///
/// Used when no real exchange is registered, and in tests, where
/// [`fail_next`](Self::fail_next) injects transient failures and
/// [`execute_calls`](Self::execute_calls) counts how often the venue was hit.
#[derive(Debug)]
pub struct SimulatedExchange {
    name: String,
    settings: SimulationSettings,
    markets: Mutex<HashMap<Symbol, SimMarket>>,
    orders: Mutex<HashMap<String, OrderStatus>>,
    balance: Mutex<AccountBalance>,
    next_order_id: AtomicU64,
    execute_calls: AtomicU32,
    pending_failures: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedExchange {
    pub fn new(name: impl Into<String>, settings: SimulationSettings) -> Self {
        let balance = AccountBalance {
            total_balance: settings.initial_balance,
            available_balance: settings.initial_balance,
            in_orders: Decimal::ZERO,
        };
        Self {
            name: name.into(),
            settings,
            markets: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            balance: Mutex::new(balance),
            next_order_id: AtomicU64::new(1),
            execute_calls: AtomicU32::new(0),
            pending_failures: AtomicU32::new(0),
        }
    }

    /// Sets an explicit book for `symbol`, keeping any price history.
    pub fn set_market(&self, symbol: &Symbol, bid: Decimal, ask: Decimal, volume: Decimal) {
        let mut markets = lock(&self.markets);
        let mid = (bid + ask) / dec!(2);
        let market = markets.entry(symbol.clone()).or_insert_with(|| SimMarket {
            bid,
            ask,
            last: mid,
            volume,
            history: VecDeque::new(),
        });
        market.bid = bid;
        market.ask = ask;
        market.volume = volume;
        market.record_trade(mid);
    }

    /// Moves the market to `price`, quoting the configured spread around it.
    pub fn set_price(&self, symbol: &Symbol, price: Decimal) {
        let half_spread = price * self.settings.spread / dec!(2);
        let volume = lock(&self.markets)
            .get(symbol)
            .map(|m| m.volume)
            .unwrap_or(self.settings.volume);
        self.set_market(symbol, price - half_spread, price + half_spread, volume);
    }

    /// Seeds a market at `price` unless one already exists.
    pub fn ensure_market(&self, symbol: &Symbol, price: Decimal) {
        let exists = lock(&self.markets).contains_key(symbol);
        if !exists {
            tracing::debug!(exchange = %self.name, %symbol, %price, "Seeding simulated market.");
            self.set_price(symbol, price);
        }
    }

    /// Makes the next `count` order executions fail.
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Total `execute_order` calls received, including failed ones.
    pub fn execute_calls(&self) -> u32 {
        self.execute_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn fill_price(&self, market: &SimMarket, order: &OrderRequest) -> Decimal {
        let slip = self.settings.slippage_percent;
        match (order.order_type, order.side) {
            (OrderType::Market, Side::Buy) => market.ask * (Decimal::ONE + slip),
            (OrderType::Market, Side::Sell) => market.bid * (Decimal::ONE - slip),
            // A resting limit fills at its own price or better.
            (OrderType::Limit { price }, Side::Buy) => market.ask.min(price),
            (OrderType::Limit { price }, Side::Sell) => market.bid.max(price),
        }
    }
}

#[async_trait]
impl ExchangeClient for SimulatedExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_market_data(&self, symbol: &Symbol) -> Result<MarketData> {
        let markets = lock(&self.markets);
        let market = markets
            .get(symbol)
            .ok_or_else(|| Error::UnknownSymbol(symbol.clone()))?;
        Ok(MarketData {
            bid: market.bid,
            ask: market.ask,
            last: market.last,
            volume: market.volume,
            timestamp: Utc::now(),
        })
    }

    async fn execute_order(&self, order: &OrderRequest) -> Result<OrderFill> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);

        if self.take_failure() {
            return Err(Error::Exchange(format!("{}: simulated venue failure", self.name)));
        }
        if order.quantity <= Decimal::ZERO {
            return Err(Error::Exchange(format!("{}: order quantity must be positive", self.name)));
        }
        if order.reference_price > Decimal::ZERO {
            self.ensure_market(&order.symbol, order.reference_price);
        }

        let executed_price = {
            let mut markets = lock(&self.markets);
            let market = markets
                .get_mut(&order.symbol)
                .ok_or_else(|| Error::UnknownSymbol(order.symbol.clone()))?;
            let price = self.fill_price(market, order);
            market.record_trade(price);
            price
        };

        let notional = executed_price * order.quantity;
        let transaction_cost = notional * self.settings.taker_fee;
        {
            let mut balance = lock(&self.balance);
            balance.total_balance -= transaction_cost;
            match order.side {
                Side::Buy => balance.available_balance -= notional + transaction_cost,
                Side::Sell => balance.available_balance += notional - transaction_cost,
            }
        }

        let slippage = if order.reference_price > Decimal::ZERO {
            let raw = (executed_price - order.reference_price) / order.reference_price;
            if order.side == Side::Sell { -raw } else { raw }
        } else {
            Decimal::ZERO
        };

        let order_id = format!(
            "{}-{}",
            self.name.to_uppercase(),
            self.next_order_id.fetch_add(1, Ordering::SeqCst)
        );
        lock(&self.orders).insert(
            order_id.clone(),
            OrderStatus {
                status: OrderState::Filled,
                filled_quantity: order.quantity,
                remaining_quantity: Decimal::ZERO,
                avg_fill_price: executed_price,
            },
        );

        tracing::debug!(
            exchange = %self.name,
            %order_id,
            symbol = %order.symbol,
            side = ?order.side,
            quantity = %order.quantity,
            price = %executed_price,
            "Simulated fill."
        );

        Ok(OrderFill {
            success: true,
            order_id,
            executed_price,
            executed_quantity: order.quantity,
            transaction_cost,
            slippage,
            timestamp: Utc::now(),
        })
    }

    async fn get_account_balance(&self) -> Result<AccountBalance> {
        Ok(lock(&self.balance).clone())
    }

    async fn check_order_status(&self, order_id: &str) -> Result<OrderStatus> {
        lock(&self.orders)
            .get(order_id)
            .cloned()
            .ok_or_else(|| Error::UnknownOrder(order_id.to_string()))
    }

    async fn recent_prices(&self, symbol: &Symbol, lookback: usize) -> Result<Vec<Decimal>> {
        let markets = lock(&self.markets);
        let Some(market) = markets.get(symbol) else {
            return Ok(Vec::new());
        };
        let skip = market.history.len().saturating_sub(lookback);
        Ok(market.history.iter().skip(skip).copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Symbol {
        Symbol::new("BTC-USD")
    }

    fn market_order(side: Side, quantity: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: btc(),
            side,
            quantity,
            order_type: OrderType::Market,
            reference_price: dec!(100),
            time_in_force: None,
        }
    }

    #[tokio::test]
    async fn market_orders_take_the_touch() {
        let exchange = SimulatedExchange::new("sim", SimulationSettings::default());
        exchange.set_market(&btc(), dec!(99), dec!(101), dec!(1000));

        let buy = exchange.execute_order(&market_order(Side::Buy, dec!(1))).await.unwrap();
        assert_eq!(buy.executed_price, dec!(101));
        assert_eq!(buy.slippage, dec!(0.01));

        let sell = exchange.execute_order(&market_order(Side::Sell, dec!(1))).await.unwrap();
        assert_eq!(sell.executed_price, dec!(99));
        assert_eq!(sell.slippage, dec!(0.01));

        let status = exchange.check_order_status(&buy.order_id).await.unwrap();
        assert_eq!(status.status, OrderState::Filled);
        assert_eq!(status.avg_fill_price, dec!(101));
    }

    #[tokio::test]
    async fn limit_orders_fill_at_limit_or_better() {
        let exchange = SimulatedExchange::new("sim", SimulationSettings::default());
        exchange.set_market(&btc(), dec!(99), dec!(101), dec!(1000));

        let mut order = market_order(Side::Buy, dec!(1));
        order.order_type = OrderType::Limit { price: dec!(100) };
        let fill = exchange.execute_order(&order).await.unwrap();
        assert_eq!(fill.executed_price, dec!(100));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_one_by_one() {
        let exchange = SimulatedExchange::new("sim", SimulationSettings::default());
        exchange.fail_next(2);
        assert!(exchange.execute_order(&market_order(Side::Buy, dec!(1))).await.is_err());
        assert!(exchange.execute_order(&market_order(Side::Buy, dec!(1))).await.is_err());
        assert!(exchange.execute_order(&market_order(Side::Buy, dec!(1))).await.is_ok());
        assert_eq!(exchange.execute_calls(), 3);
    }

    #[tokio::test]
    async fn unknown_symbols_have_no_market_data() {
        let exchange = SimulatedExchange::new("sim", SimulationSettings::default());
        let err = exchange.get_market_data(&btc()).await.unwrap_err();
        assert_eq!(err, Error::UnknownSymbol(btc()));
        assert!(exchange.recent_prices(&btc(), 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_prices_are_bounded_by_lookback() {
        let exchange = SimulatedExchange::new("sim", SimulationSettings::default());
        for price in [100, 101, 102, 103] {
            exchange.set_price(&btc(), Decimal::from(price));
        }
        let prices = exchange.recent_prices(&btc(), 2).await.unwrap();
        assert_eq!(prices, vec![dec!(102), dec!(103)]);
    }
}
