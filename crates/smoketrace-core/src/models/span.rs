//! Span data model

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use super::attribute::{lookup, AttributeValue, KeyValue};
use super::proto::{self, ProtoEnum};

/// Kind of span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpanKind {
    /// Kind not set by the producer
    #[default]
    Unspecified,
    /// Internal operation
    Internal,
    /// Server-side operation
    Server,
    /// Client-side operation
    Client,
    /// Producer in messaging
    Producer,
    /// Consumer in messaging
    Consumer,
}

impl SpanKind {
    fn from_number(n: i64) -> Self {
        match n {
            1 => Self::Internal,
            2 => Self::Server,
            3 => Self::Client,
            4 => Self::Producer,
            5 => Self::Consumer,
            _ => Self::Unspecified,
        }
    }

    fn from_name(name: &str) -> Self {
        match name.strip_prefix("SPAN_KIND_").unwrap_or(name) {
            "INTERNAL" => Self::Internal,
            "SERVER" => Self::Server,
            "CLIENT" => Self::Client,
            "PRODUCER" => Self::Producer,
            "CONSUMER" => Self::Consumer,
            _ => Self::Unspecified,
        }
    }

    /// Lowercase display name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Internal => "internal",
            Self::Server => "server",
            Self::Client => "client",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

impl<'de> Deserialize<'de> for SpanKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<ProtoEnum>::deserialize(deserializer)? {
            Some(ProtoEnum::Number(n)) => Self::from_number(n),
            Some(ProtoEnum::Name(name)) => Self::from_name(&name),
            None => Self::Unspecified,
        })
    }
}

/// Status code of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusCode {
    /// Status not set
    #[default]
    Unset,
    /// Operation completed successfully
    Ok,
    /// Operation failed
    Error,
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<ProtoEnum>::deserialize(deserializer)? {
            Some(ProtoEnum::Number(1)) => Self::Ok,
            Some(ProtoEnum::Number(2)) => Self::Error,
            Some(ProtoEnum::Name(name)) => match name.strip_prefix("STATUS_CODE_").unwrap_or(&name) {
                "OK" => Self::Ok,
                "ERROR" => Self::Error,
                _ => Self::Unset,
            },
            _ => Self::Unset,
        })
    }
}

/// Status of a span
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Status {
    /// Status code
    #[serde(default)]
    pub code: StatusCode,

    /// Status message (usually for errors)
    #[serde(default)]
    pub message: String,
}

/// A span represents a single operation within a trace
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Trace ID (32-char lowercase hex)
    #[serde(default, alias = "trace_id", deserialize_with = "proto::deserialize_trace_id")]
    pub trace_id: String,

    /// Span ID (16-char lowercase hex)
    #[serde(default, alias = "span_id", deserialize_with = "proto::deserialize_span_id")]
    pub span_id: String,

    /// W3C trace state
    #[serde(default, alias = "trace_state")]
    pub trace_state: String,

    /// Parent span ID, `None` for root spans
    #[serde(
        default,
        alias = "parent_span_id",
        deserialize_with = "proto::deserialize_parent_span_id"
    )]
    pub parent_span_id: Option<String>,

    /// Name of the operation
    #[serde(default)]
    pub name: String,

    /// Kind of span
    #[serde(default)]
    pub kind: SpanKind,

    /// Start time in unix nanoseconds
    #[serde(
        default,
        alias = "start_time_unix_nano",
        deserialize_with = "proto::deserialize_fixed64"
    )]
    pub start_time_unix_nano: u64,

    /// End time in unix nanoseconds
    #[serde(
        default,
        alias = "end_time_unix_nano",
        deserialize_with = "proto::deserialize_fixed64"
    )]
    pub end_time_unix_nano: u64,

    /// Span attributes
    #[serde(default)]
    pub attributes: Vec<KeyValue>,

    /// Attributes dropped by the producer
    #[serde(default, alias = "dropped_attributes_count")]
    pub dropped_attributes_count: u32,

    /// Events that occurred during the span
    #[serde(default)]
    pub events: Vec<Event>,

    /// Events dropped by the producer
    #[serde(default, alias = "dropped_events_count")]
    pub dropped_events_count: u32,

    /// Links to other spans
    #[serde(default)]
    pub links: Vec<Link>,

    /// Links dropped by the producer
    #[serde(default, alias = "dropped_links_count")]
    pub dropped_links_count: u32,

    /// Status of the operation
    #[serde(default)]
    pub status: Status,
}

/// An event that occurred during a span
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// When the event occurred, in unix nanoseconds
    #[serde(
        default,
        alias = "time_unix_nano",
        deserialize_with = "proto::deserialize_fixed64"
    )]
    pub time_unix_nano: u64,

    /// Event name
    #[serde(default)]
    pub name: String,

    /// Event attributes
    #[serde(default)]
    pub attributes: Vec<KeyValue>,

    /// Attributes dropped by the producer
    #[serde(default, alias = "dropped_attributes_count")]
    pub dropped_attributes_count: u32,
}

/// A link to another span
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Trace ID of the linked span
    #[serde(default, alias = "trace_id", deserialize_with = "proto::deserialize_trace_id")]
    pub trace_id: String,

    /// Span ID of the linked span
    #[serde(default, alias = "span_id", deserialize_with = "proto::deserialize_span_id")]
    pub span_id: String,

    /// W3C trace state
    #[serde(default, alias = "trace_state")]
    pub trace_state: String,

    /// Link attributes
    #[serde(default)]
    pub attributes: Vec<KeyValue>,

    /// Attributes dropped by the producer
    #[serde(default, alias = "dropped_attributes_count")]
    pub dropped_attributes_count: u32,
}

fn nanos_to_time(nanos: u64) -> Option<DateTime<Utc>> {
    if nanos == 0 {
        return None;
    }
    i64::try_from(nanos).ok().map(|n| Utc.timestamp_nanos(n))
}

impl Span {
    /// When the operation started
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        nanos_to_time(self.start_time_unix_nano)
    }

    /// When the operation ended
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        nanos_to_time(self.end_time_unix_nano)
    }

    /// Elapsed time between start and end, if both are set and ordered
    pub fn duration(&self) -> Option<Duration> {
        if self.start_time_unix_nano == 0 || self.end_time_unix_nano == 0 {
            return None;
        }
        self.end_time_unix_nano
            .checked_sub(self.start_time_unix_nano)
            .map(Duration::from_nanos)
    }

    /// Check if this span has no parent
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Check if this span ended with an error status
    pub fn is_error(&self) -> bool {
        self.status.code == StatusCode::Error
    }

    /// Get a span attribute by key
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        lookup(&self.attributes, key)
    }

    /// Get the first event with the given name
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.name == name)
    }
}

impl Event {
    /// Get an event attribute by key
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        lookup(&self.attributes, key)
    }
}
