//! Export payload decoding
//!
//! The backend dumps every export request it received as one JSON array.
//! Each element is decoded on its own so that a single malformed request
//! does not hide the others.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::TraceGraph;
use crate::models::ExportRecord;

/// An array element that could not be read as an export request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFailure {
    /// Position of the element in the payload array
    pub index: usize,
    /// Why the element was rejected
    pub reason: String,
}

impl fmt::Display for ElementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element {}: {}", self.index, self.reason)
    }
}

/// Outcome of decoding one array element
pub type ElementOutcome = std::result::Result<ExportRecord, ElementFailure>;

/// Decoded records alongside the elements that were skipped
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    /// Successfully decoded export requests, in payload order
    pub records: Vec<ExportRecord>,
    /// Elements that were skipped
    pub failures: Vec<ElementFailure>,
}

impl DecodeReport {
    /// Aggregate per-element outcomes, preserving order
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ElementOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                Ok(record) => report.records.push(record),
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }

    /// Check if every element decoded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of elements in the payload
    pub fn element_count(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// Wrap the decoded records in a queryable graph
    pub fn into_graph(self) -> TraceGraph {
        TraceGraph::new(self.records)
    }
}

/// Decode each element of the payload array independently.
///
/// Fails with [`Error::Decode`] only when the payload itself is not a JSON
/// array.
pub fn decode_elements(payload: &str) -> Result<Vec<ElementOutcome>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::decode(format!("payload is not valid JSON: {e}")))?;

    let Value::Array(elements) = value else {
        return Err(Error::decode(format!(
            "expected an array of export requests, found {}",
            json_kind(&value)
        )));
    };

    Ok(elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| decode_element(index, element))
        .collect())
}

fn decode_element(index: usize, element: Value) -> ElementOutcome {
    serde_json::from_value(element).map_err(|e| ElementFailure {
        index,
        reason: e.to_string(),
    })
}

/// Decode a payload into export records, logging and skipping bad elements
pub fn decode(payload: &str) -> Result<DecodeReport> {
    let report = DecodeReport::from_outcomes(decode_elements(payload)?);

    for failure in &report.failures {
        warn!(
            index = failure.index,
            reason = %failure.reason,
            "Skipping export request that could not be decoded"
        );
    }

    debug!(
        records = report.records.len(),
        skipped = report.failures.len(),
        "Decoded export payload"
    );

    Ok(report)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
