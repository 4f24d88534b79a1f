//! Upgrade: redeploy containers with the same settings on a new revision.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::{display_field, success_field, BatchOutcome, Severity, StreamEvent};
use super::severity::FatalPolicy;
use super::{EntityIds, Operation, Revision};
use crate::error::ConfigError;

/// Payload of `POST /upgrade`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeRequest {
    pub ids: EntityIds,
    pub repo: String,
    pub sha: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UpgradeRequest {
    /// Fails with [`ConfigError::NoIds`] when `ids` is empty.
    pub fn new(ids: impl Into<EntityIds>, revision: Revision) -> Result<Self, ConfigError> {
        Ok(Self {
            ids: ids.into().require_non_empty()?,
            repo: revision.repo,
            sha: revision.sha,
            extra: Map::new(),
        })
    }

    pub fn extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl Operation for UpgradeRequest {
    type Event = UpgradeResult;
    const NAME: &'static str = "upgrade";
    const PATH: &'static str = "/upgrade";
}

/// Outcome of upgrading one container.
///
/// On success `new_id`/`new_name` identify the replacement container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpgradeResult {
    pub success: bool,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome for UpgradeResult {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn entity_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl StreamEvent for UpgradeResult {
    fn classify(value: &Value) -> Self {
        Self {
            success: success_field(value),
            id: display_field(value, "id").unwrap_or_default(),
            new_id: display_field(value, "new_id"),
            new_name: display_field(value, "new_name"),
            error: display_field(value, "error"),
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
        self.error.as_deref()
    }
}
