//! Event types shared by the streamed operations.
//!
//! Every line of an operation's response is classified exactly once, at the
//! boundary, into the event type of its operation family. Classification is
//! total: missing or unexpected fields just come out as `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::severity::FatalPolicy;

/// How an event affects the rest of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    /// Progress or a successful outcome.
    Normal,
    /// A failure confined to this one event. Consumption continues.
    Soft,
    /// A hard failure. The stream ends after delivering this event.
    Fatal,
}

/// A record type that a stream line can be classified into.
pub trait StreamEvent: Sized {
    /// Map one decoded line to an event. Never fails.
    fn classify(value: &Value) -> Self;

    /// Severity of this event. `raw` is the line it was classified from.
    fn severity(&self, raw: &Value, policy: &FatalPolicy) -> Severity;

    /// The server-provided failure text carried by this event, if any.
    fn error_message(&self) -> Option<&str>;
}

/// Per-entity outcome of a batch operation.
pub trait BatchOutcome {
    fn succeeded(&self) -> bool;
    fn entity_id(&self) -> Option<&str>;
}

/// Read `key` as display text.
///
/// Strings come through unchanged; numbers, booleans and nested values are
/// forwarded as their JSON text. Null, missing and empty values are `None`.
pub(crate) fn display_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read the `success` flag. Anything but a literal `true` is a failure.
pub(crate) fn success_field(value: &Value) -> bool {
    value.get("success").and_then(Value::as_bool).unwrap_or(false)
}

/// Progress narration of a build or deploy.
///
/// Several fields may be set on the same line. `progress` qualifies `status`
/// and is rendered on the same line as it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrationEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

impl NarrationEvent {
    /// True when the line carried nothing displayable.
    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.stream.is_none() && self.status.is_none() && self.progress.is_none()
    }
}

impl StreamEvent for NarrationEvent {
    fn classify(value: &Value) -> Self {
        Self {
            error: display_field(value, "error"),
            stream: display_field(value, "stream"),
            status: display_field(value, "status"),
            progress: display_field(value, "progress"),
        }
    }

    fn severity(&self, raw: &Value, policy: &FatalPolicy) -> Severity {
        match self.error {
            Some(ref message) if policy.is_fatal(raw, message) => Severity::Fatal,
            Some(_) => Severity::Soft,
            None => Severity::Normal,
        }
    }

    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
