// In crates/store/src/memory.rs

use crate::{KnowledgeStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    data: serde_json::Value,
    updated_at: DateTime<Utc>,
}

/// A process-local [`KnowledgeStore`]. Writes to an existing key overwrite it.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys in `category`.
    pub async fn len(&self, category: &str) -> usize {
        self.entries
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == category)
            .count()
    }

    pub async fn updated_at(&self, category: &str, key: &str) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .await
            .get(&(category.to_string(), key.to_string()))
            .map(|e| e.updated_at)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn store(&self, category: &str, key: &str, data: serde_json::Value) -> Result<()> {
        tracing::debug!(category, key, "Storing checkpoint.");
        self.entries.write().await.insert(
            (category.to_string(), key.to_string()),
            Entry {
                data,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, category: &str, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(category.to_string(), key.to_string()))
            .map(|e| e.data.clone()))
    }
}
