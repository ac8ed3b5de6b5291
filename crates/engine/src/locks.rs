// In crates/engine/src/locks.rs

use core_types::Symbol;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// One async mutex per symbol, created on first use.
///
/// Holding the guard from risk evaluation through the ledger update keeps two
/// signals on the same symbol from both passing the duplicate-position check.
#[derive(Debug, Default)]
pub struct SymbolLocks {
    locks: Mutex<HashMap<Symbol, Arc<tokio::sync::Mutex<()>>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, symbol: &Symbol) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(symbol.clone()).or_default())
        };
        lock.lock_owned().await
    }
}
