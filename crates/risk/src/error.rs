// In crates/risk/src/error.rs

use core_types::{Direction, Symbol};
use rust_decimal::Decimal;
use thiserror::Error;

/// Every way a signal can fail risk evaluation.
///
/// The `Display` text of each variant is the human-readable rejection reason
/// handed back to callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Missing price information for {symbol}")]
    MissingPrice { symbol: Symbol },

    #[error("Portfolio exposure {current} has reached the maximum total exposure {max}")]
    ExposureExceeded { current: Decimal, max: Decimal },

    #[error("Portfolio drawdown {current} has reached the maximum drawdown {max}")]
    DrawdownExceeded { current: Decimal, max: Decimal },

    #[error("Already have a {direction} position in {symbol}")]
    DuplicatePosition { direction: Direction, symbol: Symbol },

    #[error("Insufficient risk/reward ratio: {ratio:.2} is below the minimum of {minimum}")]
    InsufficientRiskReward { ratio: Decimal, minimum: Decimal },

    /// Stop-loss equal to entry leaves no risk distance to size against.
    #[error("Position sizing failed: stop-loss equals entry price {entry_price}")]
    ZeroRiskDistance { entry_price: Decimal },

    #[error("Position sizing failed: {0}")]
    Sizing(String),

    #[error("Invalid risk parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, Error>;
