// In crates/portfolio/src/ledger.rs

use core_types::{Direction, PortfolioState, Position, Symbol, TradeAction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A fill reported back to the ledger once an order has actually traded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFill {
    pub symbol: Symbol,
    pub action: TradeAction,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Direction of an opening fill. Defaults to the action's implied
    /// direction; ignored for closes.
    #[serde(default)]
    pub direction: Option<Direction>,
}

/// Owns the portfolio state and applies the two ledger transitions:
/// open/add and reduce/close. Reductions never exceed the fill quantity.
///
/// Every transition leaves the derived figures consistent:
/// `current_exposure == sum(position.value) / total_value` and
/// `current_drawdown == max(0, 1 - total_value / high_water_mark)`.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    state: PortfolioState,
}

impl PortfolioLedger {
    /// Creates a flat ledger holding `initial_value`.
    pub fn new(initial_value: Decimal) -> Self {
        Self {
            state: PortfolioState::new(initial_value),
        }
    }

    /// Restores a ledger from a previously checkpointed state.
    pub fn from_state(mut state: PortfolioState) -> Self {
        if state.high_water_mark < state.total_value {
            state.high_water_mark = state.total_value;
        }
        let mut ledger = Self { state };
        ledger.recompute();
        ledger
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    /// A copy of the current state for read-only consumers (e.g. the risk evaluator).
    pub fn snapshot(&self) -> PortfolioState {
        self.state.clone()
    }

    /// Applies a fill and returns the resulting state.
    pub fn update_portfolio(&mut self, trade: &TradeFill) -> &PortfolioState {
        match trade.action {
            TradeAction::Close => {
                if trade.quantity <= Decimal::ZERO || trade.price <= Decimal::ZERO {
                    tracing::warn!(
                        symbol = %trade.symbol,
                        price = %trade.price,
                        quantity = %trade.quantity,
                        "Ignoring close with non-positive price or quantity."
                    );
                } else {
                    self.reduce(&trade.symbol, trade.price, trade.quantity);
                }
            }
            TradeAction::Buy | TradeAction::Sell => {
                let direction = trade
                    .direction
                    .or_else(|| trade.action.implied_direction())
                    .unwrap_or(Direction::Long);
                self.open_or_add(&trade.symbol, direction, trade.price, trade.quantity);
            }
        }
        &self.state
    }

    fn open_or_add(&mut self, symbol: &Symbol, direction: Direction, price: Decimal, quantity: Decimal) {
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            tracing::warn!(%symbol, %price, %quantity, "Ignoring fill with non-positive price or quantity.");
            return;
        }

        let held = self.state.positions.get(symbol).map(|p| p.direction);
        match held {
            None => {
                let position = Position::new(symbol.clone(), direction, quantity, price);
                tracing::info!(%symbol, %direction, %quantity, %price, "Opened position.");
                self.state.positions.insert(symbol.clone(), position);
            }
            Some(held) if held == direction => {
                if let Some(position) = self.state.positions.get_mut(symbol) {
                    let new_quantity = position.quantity + quantity;
                    position.average_price =
                        (position.average_price * position.quantity + price * quantity) / new_quantity;
                    position.quantity = new_quantity;
                    position.value = position.value + price * quantity;
                    tracing::info!(
                        %symbol,
                        quantity = %position.quantity,
                        average_price = %position.average_price,
                        "Added to position."
                    );
                }
            }
            Some(_) => {
                // An opposing fill reduces the held position; any excess flips it.
                let remainder = self.reduce(symbol, price, quantity);
                if remainder > Decimal::ZERO {
                    let position = Position::new(symbol.clone(), direction, remainder, price);
                    tracing::info!(%symbol, %direction, quantity = %remainder, "Flipped position.");
                    self.state.positions.insert(symbol.clone(), position);
                }
            }
        }
        self.recompute();
    }

    /// Realizes profit on up to `quantity` of the held position at
    /// `exit_price` and returns the part of `quantity` it did not match.
    fn reduce(&mut self, symbol: &Symbol, exit_price: Decimal, quantity: Decimal) -> Decimal {
        let Some(position) = self.state.positions.get_mut(symbol) else {
            tracing::warn!(%symbol, "Close requested for a symbol with no open position; ledger unchanged.");
            return quantity;
        };

        let closed = quantity.min(position.quantity);
        let pnl = realized_pnl(position, exit_price, closed);
        let remaining = position.quantity - closed;
        if remaining > Decimal::ZERO {
            position.quantity = remaining;
            position.value = position.average_price * remaining;
        } else {
            self.state.positions.remove(symbol);
        }

        self.state.total_value += pnl;
        if self.state.total_value > self.state.high_water_mark {
            self.state.high_water_mark = self.state.total_value;
        }
        tracing::info!(
            %symbol,
            %exit_price,
            quantity = %closed,
            %remaining,
            %pnl,
            total_value = %self.state.total_value,
            "Reduced position."
        );
        self.recompute();
        quantity - closed
    }

    fn recompute(&mut self) {
        let committed: Decimal = self.state.positions.values().map(|p| p.value).sum();
        self.state.current_exposure = if self.state.total_value > Decimal::ZERO {
            committed / self.state.total_value
        } else {
            Decimal::ZERO
        };
        self.state.current_drawdown = if self.state.high_water_mark > Decimal::ZERO {
            (Decimal::ONE - self.state.total_value / self.state.high_water_mark).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
    }
}

/// Realized profit of closing `quantity` of `position` at `exit_price`.
pub fn realized_pnl(position: &Position, exit_price: Decimal, quantity: Decimal) -> Decimal {
    match position.direction {
        Direction::Long => (exit_price - position.average_price) * quantity,
        Direction::Short => (position.average_price - exit_price) * quantity,
    }
}
