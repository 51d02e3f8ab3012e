//! The key-value contract shared by every state backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// Durable-but-ephemeral key-value storage.
///
/// Implementations are scoped to one host session. Callers treat a missing
/// key and an expired key identically.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Insert or overwrite the value stored under `key`.
    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Delete `key`, returning `true` if it existed.
    async fn remove(&self, key: &str) -> StoreResult<bool>;
}

/// Reject keys that no backend can store meaningfully.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(crate::error::StoreError::InvalidArgument(
            "state key must not be empty".into(),
        ));
    }
    Ok(())
}
