//! Export request data model
//!
//! One `ExportRecord` per `ExportTraceServiceRequest` the backend received.

use serde::Deserialize;

use super::attribute::{lookup, AttributeValue, KeyValue};
use super::span::Span;

/// One decoded export request
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    /// Resource-tagged span groups, in the order the producer sent them
    #[serde(default, alias = "resource_spans")]
    pub resource_spans: Vec<ResourceSpans>,
}

/// The entity that produced a set of spans
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource attributes, e.g. `service.name`
    #[serde(default)]
    pub attributes: Vec<KeyValue>,

    /// Attributes dropped by the producer
    #[serde(default, alias = "dropped_attributes_count")]
    pub dropped_attributes_count: u32,
}

impl Resource {
    /// Get a resource attribute by key
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        lookup(&self.attributes, key)
    }

    /// The `service.name` attribute, if it is a string
    pub fn service_name(&self) -> Option<&str> {
        self.attribute("service.name").and_then(AttributeValue::as_str)
    }
}

/// A resource together with its span groups
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawResourceSpans")]
pub struct ResourceSpans {
    /// The emitting resource
    pub resource: Resource,

    /// Span groups, one per instrumentation scope
    pub scope_spans: Vec<ScopeSpans>,

    /// Schema URL of the resource
    pub schema_url: Option<String>,
}

/// Spans sharing an instrumentation scope
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawScopeSpans")]
pub struct ScopeSpans {
    /// The instrumentation scope, if the producer named one
    pub scope: Option<InstrumentationScope>,

    /// Spans in this group
    pub spans: Vec<Span>,

    /// Schema URL of the scope
    pub schema_url: Option<String>,
}

/// Instrumentation library or scope that created spans
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationScope {
    /// Scope name, e.g. `io.opentelemetry.spring-webmvc-3.1`
    #[serde(default)]
    pub name: String,

    /// Scope version
    #[serde(default)]
    pub version: String,

    /// Scope attributes
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

// Pre-1.0 OTLP named span groups `instrumentationLibrarySpans`; during the
// rename both fields were carried, so they are merged rather than aliased.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResourceSpans {
    #[serde(default)]
    resource: Resource,
    #[serde(default, alias = "scope_spans")]
    scope_spans: Vec<ScopeSpans>,
    #[serde(default, alias = "instrumentation_library_spans")]
    instrumentation_library_spans: Vec<ScopeSpans>,
    #[serde(default, alias = "schema_url")]
    schema_url: String,
}

impl From<RawResourceSpans> for ResourceSpans {
    fn from(raw: RawResourceSpans) -> Self {
        let mut scope_spans = raw.scope_spans;
        scope_spans.extend(raw.instrumentation_library_spans);

        Self {
            resource: raw.resource,
            scope_spans,
            schema_url: non_empty(raw.schema_url),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScopeSpans {
    scope: Option<InstrumentationScope>,
    #[serde(alias = "instrumentation_library")]
    instrumentation_library: Option<InstrumentationScope>,
    #[serde(default)]
    spans: Vec<Span>,
    #[serde(default, alias = "schema_url")]
    schema_url: String,
}

impl From<RawScopeSpans> for ScopeSpans {
    fn from(raw: RawScopeSpans) -> Self {
        Self {
            scope: raw.scope.or(raw.instrumentation_library),
            spans: raw.spans,
            schema_url: non_empty(raw.schema_url),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

impl ExportRecord {
    /// Total number of spans in this export request
    pub fn span_count(&self) -> usize {
        self.resource_spans
            .iter()
            .flat_map(|rs| &rs.scope_spans)
            .map(|ss| ss.spans.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_field_names() {
        let record: ExportRecord = serde_json::from_value(json!({
            "resourceSpans": [{
                "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "checkout"}}]},
                "scopeSpans": [{
                    "scope": {"name": "io.opentelemetry.servlet-3.0", "version": "1.2.0"},
                    "spans": [{"name": "GET /"}, {"name": "SELECT"}]
                }],
                "schemaUrl": "https://opentelemetry.io/schemas/1.9.0"
            }]
        }))
        .unwrap();

        let group = &record.resource_spans[0];
        assert_eq!(group.resource.service_name(), Some("checkout"));
        assert_eq!(group.scope_spans[0].scope.as_ref().unwrap().version, "1.2.0");
        assert_eq!(group.schema_url.as_deref(), Some("https://opentelemetry.io/schemas/1.9.0"));
        assert_eq!(record.span_count(), 2);
    }

    #[test]
    fn test_legacy_instrumentation_library_names() {
        let record: ExportRecord = serde_json::from_value(json!({
            "resource_spans": [{
                "instrumentationLibrarySpans": [{
                    "instrumentationLibrary": {"name": "io.opentelemetry.auto.spring-webmvc-3.1"},
                    "spans": [{"name": "WebController.greeting"}]
                }]
            }]
        }))
        .unwrap();

        let group = &record.resource_spans[0];
        assert_eq!(group.resource, Resource::default());
        assert_eq!(group.schema_url, None);
        assert_eq!(
            group.scope_spans[0].scope.as_ref().unwrap().name,
            "io.opentelemetry.auto.spring-webmvc-3.1"
        );
        assert_eq!(group.scope_spans[0].spans[0].name, "WebController.greeting");
    }

    #[test]
    fn test_both_group_fields_are_merged_in_order() {
        let record: ExportRecord = serde_json::from_value(json!({
            "resourceSpans": [{
                "instrumentationLibrarySpans": [{"spans": [{"name": "legacy"}]}],
                "scopeSpans": [{"spans": [{"name": "current"}]}]
            }]
        }))
        .unwrap();

        let names: Vec<_> = record.resource_spans[0]
            .scope_spans
            .iter()
            .flat_map(|ss| &ss.spans)
            .map(|span| span.name.as_str())
            .collect();
        assert_eq!(names, ["current", "legacy"]);
    }
}
