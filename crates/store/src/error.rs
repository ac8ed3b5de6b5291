// In crates/store/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to encode value for {category}/{key}: {source}")]
    Encode {
        category: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode value for {category}/{key}: {source}")]
    Decode {
        category: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
