//! Logs: follow the output of an app's containers on one node.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::{display_field, Severity, StreamEvent};
use super::severity::FatalPolicy;
use super::Operation;

/// Payload of `POST /log`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRequest {
    pub appname: String,
    pub podname: String,
    pub nodename: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogRequest {
    pub fn new(
        appname: impl Into<String>,
        podname: impl Into<String>,
        nodename: impl Into<String>,
    ) -> Self {
        Self {
            appname: appname.into(),
            podname: podname.into(),
            nodename: nodename.into(),
            extra: Map::new(),
        }
    }

    pub fn extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl Operation for LogRequest {
    type Event = LogLine;
    const NAME: &'static str = "log";
    const PATH: &'static str = "/log";
}

/// One line of container output.
///
/// `data` is the output text. A line without `data` or `error` is kept
/// whole, as its JSON text, so nothing the server sends is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamEvent for LogLine {
    fn classify(value: &Value) -> Self {
        let data = display_field(value, "data");
        let error = display_field(value, "error");
        match (data, error) {
            (None, None) => Self {
                data: Some(value.to_string()),
                error: None,
            },
            (data, error) => Self { data, error },
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
