// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown execution strategy: {0}")]
    UnknownStrategy(String),
}

pub type Result<T> = std::result::Result<T, Error>;
