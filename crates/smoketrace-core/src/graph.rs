//! Queryable view over decoded export records
//!
//! Every query flattens records into their inner collections, filters, and
//! projects a field. Iteration order is record arrival order, then group
//! order within each record. Queries are lazy and can be re-run freely.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{
    AttributeValue, Event, ExportRecord, Resource, ResourceSpans, ScopeSpans, Span, SpanKind,
};

/// Yield the value of `key` from every resource that carries it.
///
/// A resource whose `key` entry holds an empty value yields nothing, so the
/// count of values can be lower than the count of resources with the key.
pub fn find_resource_attributes<'a>(
    records: &'a [ExportRecord],
    key: &'a str,
) -> impl Iterator<Item = &'a AttributeValue> + 'a {
    records
        .iter()
        .flat_map(|record| &record.resource_spans)
        .flat_map(|group| &group.resource.attributes)
        .filter(move |kv| kv.key == key)
        .filter_map(|kv| kv.value.as_ref())
}

/// Read-only trace graph built from one collection
#[derive(Debug, Clone, Default)]
pub struct TraceGraph {
    records: Vec<ExportRecord>,
}

impl TraceGraph {
    /// Wrap decoded records
    pub fn new(records: Vec<ExportRecord>) -> Self {
        Self { records }
    }

    /// The underlying export records, in arrival order
    pub fn records(&self) -> &[ExportRecord] {
        &self.records
    }

    /// Check if no spans were collected
    pub fn is_empty(&self) -> bool {
        self.spans().next().is_none()
    }

    /// All resource span groups
    pub fn resource_spans(&self) -> impl Iterator<Item = &ResourceSpans> + '_ {
        self.records.iter().flat_map(|record| &record.resource_spans)
    }

    /// All scope span groups
    pub fn scope_spans(&self) -> impl Iterator<Item = &ScopeSpans> + '_ {
        self.resource_spans().flat_map(|group| &group.scope_spans)
    }

    /// All spans, duplicates included
    pub fn spans(&self) -> impl Iterator<Item = &Span> + '_ {
        self.scope_spans().flat_map(|group| &group.spans)
    }

    /// Total number of spans, duplicates included
    pub fn span_count(&self) -> usize {
        self.spans().count()
    }

    /// Spans with distinct `(trace_id, span_id)`, keeping the first arrival.
    /// Export requests may be delivered more than once. Spans missing either
    /// id cannot be matched and are always kept.
    pub fn unique_spans(&self) -> impl Iterator<Item = &Span> + '_ {
        let mut seen = HashSet::new();
        self.spans().filter(move |span| {
            span.trace_id.is_empty()
                || span.span_id.is_empty()
                || seen.insert((span.trace_id.as_str(), span.span_id.as_str()))
        })
    }

    /// Value of `key` on every resource that carries it
    pub fn find_resource_attributes<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Iterator<Item = &'a AttributeValue> + 'a {
        find_resource_attributes(&self.records, key)
    }

    /// Resources whose `key` attribute equals `value`
    pub fn resources_with_attribute<'a>(
        &'a self,
        key: &'a str,
        value: &'a AttributeValue,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resource_spans()
            .map(|group| &group.resource)
            .filter(move |resource| resource.attribute(key) == Some(value))
    }

    /// Spans emitted by resources whose `service.name` is `service`
    pub fn spans_for_service<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a Span> + 'a {
        self.resource_spans()
            .filter(move |group| group.resource.service_name() == Some(service))
            .flat_map(|group| &group.scope_spans)
            .flat_map(|group| &group.spans)
    }

    /// Spans with the given name
    pub fn spans_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Span> + 'a {
        self.spans().filter(move |span| span.name == name)
    }

    /// Number of spans with the given name
    pub fn count_spans_by_name(&self, name: &str) -> usize {
        self.spans().filter(|span| span.name == name).count()
    }

    /// Spans of the given kind
    pub fn spans_of_kind(&self, kind: SpanKind) -> impl Iterator<Item = &Span> + '_ {
        self.spans().filter(move |span| span.kind == kind)
    }

    /// Value of `key` on every span that carries it
    pub fn find_span_attributes<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Iterator<Item = &'a AttributeValue> + 'a {
        self.spans()
            .flat_map(|span| &span.attributes)
            .filter(move |kv| kv.key == key)
            .filter_map(|kv| kv.value.as_ref())
    }

    /// Number of spans whose `key` attribute equals `value`
    pub fn count_spans_with_attribute(&self, key: &str, value: &AttributeValue) -> usize {
        self.spans()
            .filter(|span| span.attribute(key) == Some(value))
            .count()
    }

    /// Distinct trace ids in first-seen order
    pub fn trace_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.spans()
            .map(|span| span.trace_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Spans belonging to one trace
    pub fn spans_in_trace<'a>(&'a self, trace_id: &'a str) -> impl Iterator<Item = &'a Span> + 'a {
        self.spans().filter(move |span| span.trace_id == trace_id)
    }

    /// Spans without a parent
    pub fn root_spans(&self) -> impl Iterator<Item = &Span> + '_ {
        self.spans().filter(|span| span.is_root())
    }

    /// Direct children of `parent` within its trace
    pub fn children_of<'a>(&'a self, parent: &'a Span) -> impl Iterator<Item = &'a Span> + 'a {
        self.spans().filter(move |span| {
            span.trace_id == parent.trace_id
                && span.parent_span_id.as_deref() == Some(parent.span_id.as_str())
        })
    }

    /// Events with the given name across all spans
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.spans()
            .flat_map(|span| &span.events)
            .filter(move |event| event.name == name)
    }

    /// Names of the instrumentation scopes that produced spans
    pub fn scope_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.scope_spans()
            .filter_map(|group| group.scope.as_ref())
            .map(|scope| scope.name.as_str())
    }

    /// Aggregate counts for reports
    pub fn summary(&self) -> GraphSummary {
        let mut services: Vec<String> = Vec::new();
        for service in self
            .find_resource_attributes("service.name")
            .filter_map(AttributeValue::as_str)
        {
            if !services.iter().any(|s| s == service) {
                services.push(service.to_string());
            }
        }

        GraphSummary {
            records: self.records.len(),
            resource_spans: self.resource_spans().count(),
            spans: self.span_count(),
            unique_spans: self.unique_spans().count(),
            traces: self.trace_ids().len(),
            error_spans: self.spans().filter(|span| span.is_error()).count(),
            services,
        }
    }
}

impl From<Vec<ExportRecord>> for TraceGraph {
    fn from(records: Vec<ExportRecord>) -> Self {
        Self::new(records)
    }
}

/// Counts over a trace graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    /// Export requests
    pub records: usize,
    /// Resource span groups
    pub resource_spans: usize,
    /// Spans, duplicates included
    pub spans: usize,
    /// Spans with distinct ids
    pub unique_spans: usize,
    /// Distinct traces
    pub traces: usize,
    /// Spans with an error status
    pub error_spans: usize,
    /// Distinct `service.name` values in first-seen order
    pub services: Vec<String>,
}
