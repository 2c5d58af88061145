//! Collector module - trace collection from the fake backend
//!
//! Waits for the backend's accumulated export requests to stop growing, then
//! decodes them into records for the trace graph.

mod decoder;
mod stability;

pub use decoder::{decode, decode_elements, DecodeReport, ElementFailure, ElementOutcome};
pub use stability::{await_stable_content, StabilityPolicy, StableContent, EMPTY_PAYLOAD};
pub(crate) use stability::deadline_after;

use tracing::{error, info};

use crate::backend::Backend;
use crate::error::Result;
use crate::graph::TraceGraph;

/// Longest payload excerpt included in decode failure logs
const PAYLOAD_PREVIEW_CHARS: usize = 512;

/// A quiescent payload together with its decoded records
#[derive(Debug, Clone)]
pub struct Collection {
    /// The raw payload the poller settled on
    pub content: StableContent,
    /// Decoded records and skipped elements
    pub report: DecodeReport,
}

impl Collection {
    /// Wrap the decoded records in a queryable graph
    pub fn into_graph(self) -> TraceGraph {
        self.report.into_graph()
    }
}

/// Poll `backend` until its payload is stable, then decode it.
///
/// A payload that is not a JSON array is logged with a truncated preview and
/// the decode error is returned.
pub async fn collect<B>(backend: &B, policy: &StabilityPolicy) -> Result<Collection>
where
    B: Backend + ?Sized,
{
    let content = await_stable_content(|| backend.fetch(), policy).await?;

    let report = decode(&content.content).map_err(|e| {
        error!(
            error = %e,
            size = content.content.len(),
            payload = %preview(&content.content),
            "Backend returned an undecodable payload"
        );
        e
    })?;

    info!(
        records = report.records.len(),
        skipped = report.failures.len(),
        stable = content.stable,
        attempts = content.attempts,
        "Collected traces"
    );

    Ok(Collection { content, report })
}

fn preview(payload: &str) -> String {
    let mut chars = payload.chars();
    let mut excerpt: String = chars.by_ref().take(PAYLOAD_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        excerpt.push_str("...");
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::error::Error;
    use serde_json::json;
    use std::time::Duration;

    fn policy() -> StabilityPolicy {
        StabilityPolicy::default()
            .with_deadline(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_decodes_stable_payload() {
        let backend = InMemoryBackend::new();
        backend.push(json!({"resourceSpans": [{"scopeSpans": [{"spans": [{"name": "a"}]}]}]}));
        backend.push(json!({"resourceSpans": "broken"}));

        let collection = collect(&backend, &policy()).await.unwrap();

        assert!(collection.content.stable);
        assert_eq!(collection.report.records.len(), 1);
        assert_eq!(collection.report.failures.len(), 1);
        assert_eq!(collection.into_graph().span_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_surfaces_decode_error() {
        let backend = InMemoryBackend::with_raw_payload("{\"not\": \"an array\"}");

        let err = collect(&backend, &policy()).await.unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_preview_truncates_long_payloads() {
        let long = "x".repeat(PAYLOAD_PREVIEW_CHARS + 10);
        let excerpt = preview(&long);

        assert_eq!(excerpt.len(), PAYLOAD_PREVIEW_CHARS + 3);
        assert!(excerpt.ends_with("..."));
        assert_eq!(preview("[]"), "[]");
    }
}
