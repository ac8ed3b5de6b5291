// In crates/portfolio/src/lib.rs

pub mod ledger;

pub use ledger::{PortfolioLedger, TradeFill};
