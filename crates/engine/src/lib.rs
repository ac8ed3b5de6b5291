// In crates/engine/src/lib.rs

pub mod actor;
pub mod error;
pub mod locks;
pub mod pipeline;

pub use actor::{EngineHandle, spawn};
pub use error::{Error, Result};
pub use pipeline::TradingEngine;
