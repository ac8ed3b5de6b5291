// In crates/execution/src/error.rs

use core_types::Symbol;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The signal cannot be turned into an order. Never retried.
    #[error("Invalid signal: {0}")]
    Validation(String),

    #[error("Execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("No market data for symbol {0}")]
    UnknownSymbol(Symbol),

    #[error("Unknown order id {0}")]
    UnknownOrder(String),

    #[error("Limit order expired after {seconds}s without a fill")]
    LimitExpired { seconds: u64 },

    #[error("Quoted price {quoted} is {deviation} away from entry, beyond the slippage tolerance {tolerance}")]
    SlippageExceeded {
        quoted: Decimal,
        deviation: Decimal,
        tolerance: Decimal,
    },
}

impl Error {
    /// Whether the retry loop may try the trade again after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
