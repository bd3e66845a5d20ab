//! Path-addressed tree store boundary.
//!
//! Paths are `/`-separated segments such as `todos/alice@example,com/-Nabc`.
//! Every backend offers the same four primitives; nothing above this module
//! knows which backend it talks to.

pub mod memory;
pub mod realtime;

use crate::config::{Config, StoreBackend};
use crate::error::StoreError;
use crate::identity::Session;
use serde_json::{Map, Value};

pub use memory::MemoryStore;
pub use realtime::RealtimeStore;

pub trait TreeStore: Send {
    /// One-shot read of the subtree at `path`. `None` when nothing is stored there.
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Creates a child of `path` under a store-generated key and returns the key.
    fn push(&self, path: &str, value: &Value) -> Result<String, StoreError>;

    /// Writes only the given fields at `path`, leaving siblings untouched.
    fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError>;

    /// Deletes the node at `path`. Deleting a missing node succeeds.
    fn remove(&self, path: &str) -> Result<(), StoreError>;
}

pub fn open_store(config: &Config, session: &Session) -> Result<Box<dyn TreeStore>, StoreError> {
    match config.store.backend {
        StoreBackend::Realtime => Ok(Box::new(RealtimeStore::new(&config.firebase, session)?)),
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
    }
}

/// Splits a store path into segments, rejecting keys the database refuses.
pub fn split_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    for segment in &segments {
        if segment
            .chars()
            .any(|c| matches!(c, '.' | '#' | '$' | '[' | ']') || c.is_control())
        {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::split_path;

    #[test]
    fn splits_and_ignores_stray_slashes() {
        let segments = split_path("/todos/a@b,com//-Nx/").expect("valid path");
        assert_eq!(segments, vec!["todos", "a@b,com", "-Nx"]);
    }

    #[test]
    fn rejects_forbidden_characters() {
        assert!(split_path("todos/a@b.com").is_err());
        assert!(split_path("todos/a#b").is_err());
        assert!(split_path("todos/[0]").is_err());
        assert!(split_path("").is_err());
    }
}
