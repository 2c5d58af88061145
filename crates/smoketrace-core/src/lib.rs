//! # Smoketrace
//!
//! Trace collection verification for instrumentation smoke tests.
//!
//! An instrumented target sends spans through a telemetry collector to a fake
//! backend that stores every export request it receives. Smoketrace waits for
//! that store to stop growing, decodes it, and exposes the result as a
//! queryable trace graph.
//!
//! ## Architecture
//!
//! - **Backend**: fetch and reset access to the fake backend's export store
//! - **Collector**: stability polling and export decoding
//! - **Graph**: flatten/filter/project queries over decoded exports
//! - **Harness**: per-suite test environment with reset between cases
//!
//! ## Quick Start
//!
//! ```bash
//! # Wait for exports to settle and summarize them
//! smoketrace wait --deadline 30s
//!
//! # List the service names that reported spans
//! smoketrace attrs service.name
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backend;
pub mod collector;
pub mod config;
pub mod error;
pub mod graph;
pub mod harness;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};
pub use graph::{find_resource_attributes, TraceGraph};
pub use harness::{Component, TestEnvironment};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::backend::{Backend, HttpBackend, InMemoryBackend};
    pub use crate::collector::{await_stable_content, collect, decode, StabilityPolicy};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::graph::{find_resource_attributes, TraceGraph};
    pub use crate::harness::{Component, TestEnvironment};
    pub use crate::models::*;
}
