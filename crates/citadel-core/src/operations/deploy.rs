//! Deploy: start containers from a built revision.
//!
//! A deploy stream can mix two kinds of lines: progress narration while the
//! image is prepared, and one result per container once containers start.
//! Lines carrying a `success` key are container results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::{
    display_field, success_field, BatchOutcome, NarrationEvent, Severity, StreamEvent,
};
use super::severity::FatalPolicy;
use super::{Operation, Revision};

/// Memory limit used when the caller gives none (512 MiB). A client-side
/// default; the deploy endpoint itself expects an explicit value.
pub const DEFAULT_MEMORY: u64 = 512 * 1024 * 1024;

/// Payload of `POST /deploy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployRequest {
    pub repo: String,
    pub sha: String,
    /// Pod (zone of nodes) to deploy into, e.g. `dev`.
    #[serde(rename = "podname")]
    pub pod: String,
    /// Node to pin containers to. Empty lets the scheduler choose.
    #[serde(rename = "nodename")]
    pub node: String,
    /// Entrypoint name from the app's `app.yaml`.
    pub entrypoint: String,
    /// CPUs per container, e.g. `1.5`. `0` for a shared deploy.
    pub cpu_quota: f64,
    /// Memory limit per container, in bytes.
    pub memory: u64,
    pub count: u32,
    /// CIDR → IP to bind. An empty IP lets the server pick one.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, String>,
    /// Named group of environment variables to inject.
    #[serde(rename = "envname", skip_serializing_if = "Option::is_none")]
    pub env_group_name: Option<String>,
    /// Extra `KEY=VALUE` variables, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_env: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeployRequest {
    pub fn new(revision: Revision, pod: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            repo: revision.repo,
            sha: revision.sha,
            pod: pod.into(),
            node: String::new(),
            entrypoint: entrypoint.into(),
            cpu_quota: 0.0,
            memory: DEFAULT_MEMORY,
            count: 1,
            networks: BTreeMap::new(),
            env_group_name: None,
            extra_env: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    pub fn cpu_quota(mut self, cpu_quota: f64) -> Self {
        self.cpu_quota = cpu_quota;
        self
    }

    pub fn memory(mut self, memory: u64) -> Self {
        self.memory = memory;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn networks(mut self, networks: BTreeMap<String, String>) -> Self {
        self.networks = networks;
        self
    }

    /// Set the env group. An empty name means no group.
    pub fn env_group_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.env_group_name = if name.is_empty() { None } else { Some(name) };
        self
    }

    pub fn extra_env<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_env = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl Operation for DeployRequest {
    type Event = DeployEvent;
    const NAME: &'static str = "deploy";
    const PATH: &'static str = "/deploy";
}

/// Parse `NAME[:IP]` network arguments into a map.
///
/// Only the first `:` separates name from IP; a bare name maps to an empty IP.
/// A later argument for the same name replaces an earlier one.
pub fn parse_networks<I, S>(args: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .filter(|arg| !arg.as_ref().is_empty())
        .map(|arg| match arg.as_ref().split_once(':') {
            Some((name, ip)) => (name.to_string(), ip.to_string()),
            None => (arg.as_ref().to_string(), String::new()),
        })
        .collect()
}

/// Outcome of starting one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome for DeployResult {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn entity_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// One line of a deploy stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeployEvent {
    Progress(NarrationEvent),
    Container(DeployResult),
}

impl StreamEvent for DeployEvent {
    fn classify(value: &Value) -> Self {
        if value.get("success").is_some() {
            DeployEvent::Container(DeployResult {
                success: success_field(value),
                id: display_field(value, "id"),
                name: display_field(value, "name"),
                error: display_field(value, "error"),
            })
        } else {
            DeployEvent::Progress(NarrationEvent::classify(value))
        }
    }

    fn severity(&self, raw: &Value, policy: &FatalPolicy) -> Severity {
        match self {
            DeployEvent::Progress(narration) => narration.severity(raw, policy),
            DeployEvent::Container(result) if result.success => Severity::Normal,
            DeployEvent::Container(_) => Severity::Soft,
        }
    }

    fn error_message(&self) -> Option<&str> {
        match self {
            DeployEvent::Progress(narration) => narration.error_message(),
            DeployEvent::Container(result) => result.error.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> DeployRequest {
        DeployRequest::new(Revision::new("git@x:y/z.git", "abc123"), "dev", "web")
    }

    #[test]
    fn payload_omits_unset_optional_fields() {
        let payload = serde_json::to_value(request()).unwrap();
        let object = payload.as_object().unwrap();

        assert!(!object.contains_key("networks"));
        assert!(!object.contains_key("envname"));
        assert!(!object.contains_key("extra_env"));
        assert_eq!(payload["podname"], "dev");
        assert_eq!(payload["nodename"], "");
        assert_eq!(payload["entrypoint"], "web");
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["memory"], DEFAULT_MEMORY);
    }

    #[test]
    fn explicit_memory_replaces_the_client_default() {
        assert_eq!(DEFAULT_MEMORY, 536_870_912);
        let payload = serde_json::to_value(request().memory(1 << 30)).unwrap();
        assert_eq!(payload["memory"], 1u64 << 30);
    }

    #[test]
    fn payload_keeps_network_with_empty_ip() {
        let networks = BTreeMap::from([("10.0.0.0/8".to_string(), String::new())]);
        let payload = serde_json::to_value(request().networks(networks)).unwrap();

        assert_eq!(payload["networks"], json!({"10.0.0.0/8": ""}));
    }

    #[test]
    fn payload_includes_env_settings_when_set() {
        let payload = serde_json::to_value(
            request()
                .env_group_name("prod")
                .extra_env(["A=1", "B=x=y"])
                .cpu_quota(1.5)
                .count(3)
                .node("node-1"),
        )
        .unwrap();

        assert_eq!(payload["envname"], "prod");
        assert_eq!(payload["extra_env"], json!(["A=1", "B=x=y"]));
        assert_eq!(payload["cpu_quota"], 1.5);
        assert_eq!(payload["count"], 3);
        assert_eq!(payload["nodename"], "node-1");
    }

    #[test]
    fn empty_env_group_name_is_omitted() {
        let payload = serde_json::to_value(request().env_group_name("")).unwrap();
        assert!(payload.get("envname").is_none());
    }

    #[test]
    fn parse_networks_splits_on_first_colon() {
        let networks = parse_networks(["calico:10.102.0.37", "macvlan", "weird:1:2", ""]);

        assert_eq!(networks.len(), 3);
        assert_eq!(networks["calico"], "10.102.0.37");
        assert_eq!(networks["macvlan"], "");
        assert_eq!(networks["weird"], "1:2");
    }

    #[test]
    fn classify_container_result() {
        let event = DeployEvent::classify(&json!({
            "success": true,
            "id": "c0ffee",
            "name": "app_web_abc",
            "podname": "dev"
        }));

        assert_eq!(
            event,
            DeployEvent::Container(DeployResult {
                success: true,
                id: Some("c0ffee".to_string()),
                name: Some("app_web_abc".to_string()),
                error: None,
            })
        );
    }

    #[test]
    fn classify_progress_line() {
        let event = DeployEvent::classify(&json!({"status": "Creating container"}));
        assert!(matches!(
            event,
            DeployEvent::Progress(NarrationEvent { ref status, .. }) if status.as_deref() == Some("Creating container")
        ));
    }

    #[test]
    fn failed_container_is_soft_even_when_not_found() {
        let policy = FatalPolicy::default();
        let raw = json!({"success": false, "error": "node not found"});
        let event = DeployEvent::classify(&raw);

        assert_eq!(event.severity(&raw, &policy), Severity::Soft);
        assert_eq!(event.error_message(), Some("node not found"));
    }

    #[test]
    fn fatal_progress_error() {
        let policy = FatalPolicy::default();
        let raw = json!({"error": "entrypoint web not found"});
        let event = DeployEvent::classify(&raw);

        assert_eq!(event.severity(&raw, &policy), Severity::Fatal);
    }
}
