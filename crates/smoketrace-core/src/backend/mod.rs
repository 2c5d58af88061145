//! Backend layer for smoketrace
//!
//! The fake backend accumulates every export request the collector forwards
//! to it. The harness only ever reads that store or clears it.

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Access to the backend's accumulated export store
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch every export request received since the last reset, as a JSON
    /// array. The payload only grows while traffic is in flight.
    async fn fetch(&self) -> Result<String>;

    /// Clear the store. Must be idempotent.
    async fn reset(&self) -> Result<()>;
}

#[async_trait]
impl<B> Backend for Arc<B>
where
    B: Backend + ?Sized,
{
    async fn fetch(&self) -> Result<String> {
        (**self).fetch().await
    }

    async fn reset(&self) -> Result<()> {
        (**self).reset().await
    }
}
