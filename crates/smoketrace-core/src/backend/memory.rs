//! In-process backend for exercising the harness without a container

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::Backend;
use crate::error::Result;

#[derive(Debug, Default)]
struct Store {
    exports: Vec<Value>,
    raw_payload: Option<String>,
}

/// Backend that keeps export requests in memory.
///
/// Clones share the same store, so a test can keep a handle for pushing
/// exports while a `TestEnvironment` owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<Mutex<Store>>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose fetch returns `payload` verbatim until reset
    pub fn with_raw_payload(payload: impl Into<String>) -> Self {
        let backend = Self::new();
        backend.store.lock().raw_payload = Some(payload.into());
        backend
    }

    /// Record one export request as the collector would forward it
    pub fn push(&self, export: Value) {
        self.store.lock().exports.push(export);
    }

    /// Record one export request given as JSON text
    pub fn push_raw(&self, export: &str) -> Result<()> {
        self.push(serde_json::from_str(export)?);
        Ok(())
    }

    /// Number of export requests currently held
    pub fn len(&self) -> usize {
        self.store.lock().exports.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        let store = self.store.lock();
        store.exports.is_empty() && store.raw_payload.is_none()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn fetch(&self) -> Result<String> {
        let store = self.store.lock();
        match &store.raw_payload {
            Some(payload) => Ok(payload.clone()),
            None => Ok(serde_json::to_string(&store.exports)?),
        }
    }

    async fn reset(&self) -> Result<()> {
        let mut store = self.store.lock();
        store.exports.clear();
        store.raw_payload = None;
        Ok(())
    }
}
