//! Remove: stop and delete containers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::{display_field, success_field, BatchOutcome, Severity, StreamEvent};
use super::severity::FatalPolicy;
use super::{EntityIds, Operation};
use crate::error::ConfigError;

/// Payload of `POST /remove`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveRequest {
    pub ids: EntityIds,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoveRequest {
    /// Fails with [`ConfigError::NoIds`] when `ids` is empty.
    pub fn new(ids: impl Into<EntityIds>) -> Result<Self, ConfigError> {
        Ok(Self {
            ids: ids.into().require_non_empty()?,
            extra: Map::new(),
        })
    }

    pub fn extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl Operation for RemoveRequest {
    type Event = RemoveResult;
    const NAME: &'static str = "remove";
    const PATH: &'static str = "/remove";
}

/// Outcome of removing one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoveResult {
    pub success: bool,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchOutcome for RemoveResult {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn entity_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl StreamEvent for RemoveResult {
    fn classify(value: &Value) -> Self {
        Self {
            success: success_field(value),
            id: display_field(value, "id").unwrap_or_default(),
            message: display_field(value, "message"),
        }
    }

    fn severity(&self, _raw: &Value, _policy: &FatalPolicy) -> Severity {
        if self.success {
            Severity::Normal
        } else {
            Severity::Soft
        }
    }

    fn error_message(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            self.message.as_deref()
        }
    }
}
