// In crates/store/src/lib.rs

pub mod error;
pub mod memory;

pub use error::{Error, Result};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Checkpoint categories the pipeline writes to.
pub mod categories {
    pub const RISK_PARAMETERS: &str = "risk_parameters";
    pub const PORTFOLIO_STATE: &str = "portfolio_state";
    pub const EXECUTION_RESULTS: &str = "execution_results";
}

/// A key-value store for pipeline checkpoints, partitioned by category.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn store(&self, category: &str, key: &str, data: serde_json::Value) -> Result<()>;

    async fn get(&self, category: &str, key: &str) -> Result<Option<serde_json::Value>>;
}

/// Serializes `value` and stores it under `category`/`key`.
pub async fn store_json<T: Serialize + Sync>(
    store: &dyn KnowledgeStore,
    category: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let data = serde_json::to_value(value).map_err(|source| Error::Encode {
        category: category.to_string(),
        key: key.to_string(),
        source,
    })?;
    store.store(category, key, data).await
}

/// Loads and deserializes the value under `category`/`key`, if any.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KnowledgeStore,
    category: &str,
    key: &str,
) -> Result<Option<T>> {
    let Some(data) = store.get(category, key).await? else {
        return Ok(None);
    };
    serde_json::from_value(data).map(Some).map_err(|source| Error::Decode {
        category: category.to_string(),
        key: key.to_string(),
        source,
    })
}
