//! The citadel client.
//!
//! [`Client`] ties together the transport, the fatal-error policy and the
//! optional wire log. Streamed operations go through [`Client::stream`];
//! everything else is a plain request/response call through
//! [`Client::request`].

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::{ApiError, ConfigError};
use crate::logging::WireLog;
use crate::operations::{
    BuildRequest, DeployRequest, FatalPolicy, LogLine, LogRequest, Operation, RemoveRequest,
    UpgradeRequest,
};
use crate::stream::OperationStream;
use crate::transport::{ClientConfig, Transport};

pub struct Client {
    transport: Transport,
    policy: FatalPolicy,
    wire_log_dir: Option<PathBuf>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            transport: Transport::new(config),
            policy: FatalPolicy::default(),
            wire_log_dir: None,
        }
    }

    /// Replace the rule that decides which narration errors are fatal.
    pub fn with_fatal_policy(mut self, policy: FatalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write a raw transcript of every streamed operation under `dir`.
    pub fn with_wire_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.wire_log_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    /// Send `operation` and return its events as a lazy stream.
    ///
    /// Connection failures and refusals are returned here, before any event.
    pub fn stream<O: Operation>(
        &self,
        operation: &O,
    ) -> Result<OperationStream<O::Event>, ApiError> {
        let payload = serde_json::to_value(operation)?;

        let mut wire_log = WireLog::open(self.wire_log_dir.as_deref(), O::NAME);
        wire_log.record("SEND", payload.to_string().as_bytes());

        log::debug!("starting {} operation", O::NAME);
        let body = self.transport.open_stream("POST", O::PATH, Some(&payload))?;

        Ok(OperationStream::with_wire_log(
            body,
            self.policy.clone(),
            wire_log,
        ))
    }

    pub fn build(
        &self,
        request: &BuildRequest,
    ) -> Result<OperationStream<<BuildRequest as Operation>::Event>, ApiError> {
        self.stream(request)
    }

    pub fn deploy(
        &self,
        request: &DeployRequest,
    ) -> Result<OperationStream<<DeployRequest as Operation>::Event>, ApiError> {
        self.stream(request)
    }

    pub fn remove(
        &self,
        request: &RemoveRequest,
    ) -> Result<OperationStream<<RemoveRequest as Operation>::Event>, ApiError> {
        self.stream(request)
    }

    pub fn upgrade(
        &self,
        request: &UpgradeRequest,
    ) -> Result<OperationStream<<UpgradeRequest as Operation>::Event>, ApiError> {
        self.stream(request)
    }

    /// Follow `app`'s container output on `node`.
    ///
    /// The pod is looked up from the node first. A node that belongs to no
    /// pod fails with [`ConfigError::UnknownNode`] and nothing is streamed.
    pub fn log(&self, node: &str, app: &str) -> Result<OperationStream<LogLine>, ApiError> {
        let pod = self
            .find_node_pod(node)?
            .ok_or_else(|| ConfigError::UnknownNode(node.to_string()))?;
        self.stream(&LogRequest::new(app, pod, node))
    }

    /// Name of the pod that has `node`, or `None`.
    pub fn find_node_pod(&self, node: &str) -> Result<Option<String>, ApiError> {
        let pods = self.get_pods()?;
        for pod in pods.as_array().into_iter().flatten() {
            let Some(pod_name) = pod.get("name").and_then(Value::as_str) else {
                continue;
            };
            let nodes = self.get_pod_nodes(pod_name)?;
            let found = nodes
                .as_array()
                .into_iter()
                .flatten()
                .any(|n| n.get("name").and_then(Value::as_str) == Some(node));
            if found {
                return Ok(Some(pod_name.to_string()));
            }
        }
        Ok(None)
    }

    /// Plain request/response call; the body is decoded as one JSON document.
    pub fn request(
        &self,
        method: &str,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.transport.fetch_json(method, path, params, body)
    }

    fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request("GET", path, &[], None)
    }

    // ========================================================================
    // Apps
    // ========================================================================

    pub fn get_app(&self, app: &str) -> Result<Value, ApiError> {
        self.get(&format!("/app/{app}"))
    }

    pub fn get_app_containers(&self, app: &str) -> Result<Value, ApiError> {
        self.get(&format!("/app/{app}/containers"))
    }

    pub fn get_app_releases(&self, app: &str) -> Result<Value, ApiError> {
        self.get(&format!("/app/{app}/releases"))
    }

    pub fn get_app_envs(&self, app: &str) -> Result<Value, ApiError> {
        self.get(&format!("/app/{app}/env"))
    }

    pub fn get_app_env(&self, app: &str, env: &str) -> Result<Value, ApiError> {
        self.get(&format!("/app/{app}/env/{env}"))
    }

    /// Replace the variables of env group `env` with `vars`.
    pub fn set_app_env(
        &self,
        app: &str,
        env: &str,
        vars: &Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let body = Value::Object(vars.clone());
        self.request("PUT", &format!("/app/{app}/env/{env}"), &[], Some(&body))
    }

    pub fn delete_app_env(&self, app: &str, env: &str) -> Result<Value, ApiError> {
        self.request("DELETE", &format!("/app/{app}/env/{env}"), &[], None)
    }

    // ========================================================================
    // Releases
    // ========================================================================

    pub fn get_release(&self, app: &str, sha: &str) -> Result<Value, ApiError> {
        self.get(&format!("/app/{app}/version/{sha}"))
    }

    pub fn get_release_containers(&self, app: &str, sha: &str) -> Result<Value, ApiError> {
        self.get(&format!("/app/{app}/version/{sha}/containers"))
    }

    pub fn register_release(
        &self,
        app: &str,
        sha: &str,
        git: &str,
        branch: Option<&str>,
    ) -> Result<Value, ApiError> {
        let body = serde_json::json!({
            "name": app,
            "sha": sha,
            "git": git,
            "branch": branch,
        });
        self.request("POST", "/app/register", &[], Some(&body))
    }

    // ========================================================================
    // Containers and pods
    // ========================================================================

    pub fn get_container(&self, id: &str) -> Result<Value, ApiError> {
        self.get(&format!("/container/{id}"))
    }

    pub fn get_pods(&self) -> Result<Value, ApiError> {
        self.get("/pod")
    }

    pub fn get_pod(&self, pod: &str) -> Result<Value, ApiError> {
        self.get(&format!("/pod/{pod}"))
    }

    pub fn get_pod_nodes(&self, pod: &str) -> Result<Value, ApiError> {
        self.get(&format!("/pod/{pod}/nodes"))
    }

    pub fn get_pod_containers(&self, pod: &str) -> Result<Value, ApiError> {
        self.get(&format!("/pod/{pod}/containers"))
    }

    pub fn get_pod_networks(&self, pod: &str) -> Result<Value, ApiError> {
        self.get(&format!("/pod/{pod}/networks"))
    }

    pub fn get_memcap(&self, pod: &str) -> Result<Value, ApiError> {
        self.get(&format!("/pod/{pod}/getmemcap"))
    }

    pub fn sync_memcap(&self, pod: &str) -> Result<Value, ApiError> {
        self.request("POST", &format!("/pod/{pod}/syncmemcap"), &[], None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use crate::operations::{
        DeployEvent, NarrationEvent, RemoveResult, Revision, Severity, UpgradeResult,
    };
    use crate::stream::Termination;
    use std::io::Read;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    /// What the test server saw.
    #[derive(Debug)]
    struct Seen {
        method: String,
        url: String,
        token: Option<String>,
        body: String,
    }

    /// Serve exactly one request with `status` and `body`, then stop.
    fn serve_once(status: u16, body: &str) -> (String, JoinHandle<Seen>) {
        let (host, handle) = serve_sequence(vec![(status, body.to_string())]);
        let handle = thread::spawn(move || handle.join().unwrap().remove(0));
        (host, handle)
    }

    /// Serve one request per entry of `responses`, in order, then stop.
    fn serve_sequence(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Seen>>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let mut request = server.recv().unwrap();
                let mut received = String::new();
                request.as_reader().read_to_string(&mut received).unwrap();

                seen.push(Seen {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    token: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("X-Neptulon-Token"))
                        .map(|h| h.value.to_string()),
                    body: received,
                });

                let header =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
            seen
        });

        (format!("http://127.0.0.1:{port}"), handle)
    }

    fn client(host: &str) -> Client {
        Client::new(
            ClientConfig::new(host)
                .auth_token("secret")
                .zone("c1")
                .timeout(Duration::from_secs(10)),
        )
    }

    #[test]
    fn build_streams_narration_events() {
        let (host, server) = serve_once(
            200,
            "{\"stream\":\"Step 1/3\"}\n{\"status\":\"Pulling\"}\n{\"status\":\"Done\"}\n",
        );
        let request = BuildRequest::new(Revision::new("git@x:y/z.git", "abc123"));

        let mut events = client(&host).build(&request).unwrap();
        let collected: Vec<NarrationEvent> =
            events.by_ref().map(|e| e.unwrap().event).collect();

        assert_eq!(collected.len(), 3);
        assert_eq!(events.termination(), Some(&Termination::Exhausted));

        let seen = server.join().unwrap();
        assert_eq!(seen.method, "POST");
        assert!(seen.url.starts_with("/api/v1/build?"));
        assert!(seen.url.contains("start=0"));
        assert!(seen.url.contains("limit=100"));
        assert!(seen.url.contains("zone=c1"));
        assert_eq!(seen.token.as_deref(), Some("secret"));

        let body: Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(body["repo"], "git@x:y/z.git");
        assert_eq!(body["sha"], "abc123");
    }

    #[test]
    fn remove_reports_partial_failure() {
        let (host, server) = serve_once(
            200,
            "{\"success\":true,\"id\":\"id1\"}\n{\"success\":false,\"id\":\"id2\",\"message\":\"in use\"}\n",
        );
        let request = RemoveRequest::new(["id1", "id2"]).unwrap();

        let results: Vec<RemoveResult> = client(&host)
            .remove(&request)
            .unwrap()
            .map(|e| e.unwrap().event)
            .collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].message.as_deref(), Some("in use"));

        let body: Value = serde_json::from_str(&server.join().unwrap().body).unwrap();
        assert_eq!(body, serde_json::json!({"ids": ["id1", "id2"]}));
    }

    #[test]
    fn upgrade_and_deploy_use_their_paths() {
        let (host, server) = serve_once(
            200,
            "{\"success\":true,\"id\":\"old\",\"new_id\":\"new\",\"new_name\":\"web_new\"}\n",
        );
        let request = UpgradeRequest::new("old", Revision::new("r", "s")).unwrap();
        let results: Vec<UpgradeResult> = client(&host)
            .upgrade(&request)
            .unwrap()
            .map(|e| e.unwrap().event)
            .collect();
        assert_eq!(results[0].new_id.as_deref(), Some("new"));
        assert!(server.join().unwrap().url.starts_with("/api/v1/upgrade"));

        let (host, server) = serve_once(200, "{\"error\":\"entrypoint web not found\"}\n");
        let request = DeployRequest::new(Revision::new("r", "s"), "dev", "web");
        let results: Vec<_> = client(&host)
            .deploy(&request)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].severity, Severity::Fatal);
        assert!(matches!(results[0].event, DeployEvent::Progress(_)));
        assert!(server.join().unwrap().url.starts_with("/api/v1/deploy"));
    }

    #[test]
    fn non_200_is_remote_error_before_streaming() {
        let (host, server) = serve_once(400, r#"{"error":"pod dev not found"}"#);
        let request = BuildRequest::new(Revision::new("r", "s"));

        match client(&host).build(&request) {
            Err(ApiError::Remote { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "pod dev not found");
            }
            Err(other) => panic!("expected remote error, got {other:?}"),
            Ok(_) => panic!("expected remote error, got a stream"),
        }
        server.join().unwrap();
    }

    #[test]
    fn unexpected_success_code_is_remote_error() {
        let (host, server) = serve_once(201, r#"{"error":"created, not streamed"}"#);

        let err = client(&host).get_app("web").unwrap_err();
        assert_eq!(err.status_code(), Some(201));
        assert_eq!(err.to_string(), "created, not streamed");
        server.join().unwrap();
    }

    #[test]
    fn malformed_line_from_server() {
        let (host, server) = serve_once(200, "{\"success\":true,\"id\":\"id1\"}\n<html>\n");
        let request = RemoveRequest::new("id1").unwrap();

        let results: Vec<_> = client(&host).remove(&request).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ApiError::Protocol { ref malformed_line, .. }) if malformed_line == b"<html>"
        ));
        server.join().unwrap();
    }

    #[test]
    fn connection_refused_before_any_event() {
        // Bind then drop a listener to get a port nobody is listening on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let request = RemoveRequest::new("id1").unwrap();

        let err = client(&format!("http://127.0.0.1:{port}"))
            .remove(&request)
            .err()
            .expect("connection should fail");

        assert!(matches!(
            err,
            ApiError::Transport {
                kind: TransportErrorKind::ConnectionRefused,
                ..
            }
        ));
    }

    #[test]
    fn silent_server_times_out_before_any_event() {
        // Accepts the connection (kernel backlog) but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let request = RemoveRequest::new("id1").unwrap();

        let client = Client::new(
            ClientConfig::new(format!("http://127.0.0.1:{port}"))
                .auth_token("secret")
                .timeout(Duration::from_millis(300)),
        );
        let err = client.remove(&request).err().expect("request should time out");

        match err {
            ApiError::Transport { kind, message } => {
                assert_eq!(kind, TransportErrorKind::Timeout);
                assert_eq!(message, "Read timeout");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        drop(listener);
    }

    #[test]
    fn log_resolves_pod_then_streams_lines() {
        let (host, server) = serve_sequence(vec![
            (200, r#"[{"name":"dev"},{"name":"intra"}]"#.to_string()),
            (200, r#"[{"name":"node-0"}]"#.to_string()),
            (200, r#"[{"name":"node-1"},{"name":"node-2"}]"#.to_string()),
            (
                200,
                "{\"data\":\"GET / 200\"}\n{\"data\":\"GET /ping 200\"}\n".to_string(),
            ),
        ]);

        let lines: Vec<LogLine> = client(&host)
            .log("node-2", "web")
            .unwrap()
            .map(|e| e.unwrap().event)
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].data.as_deref(), Some("GET /ping 200"));

        let seen = server.join().unwrap();
        assert!(seen[0].url.starts_with("/api/v1/pod?"));
        assert!(seen[1].url.starts_with("/api/v1/pod/dev/nodes"));
        assert!(seen[2].url.starts_with("/api/v1/pod/intra/nodes"));
        assert_eq!(seen[3].method, "POST");
        assert!(seen[3].url.starts_with("/api/v1/log"));
        assert_eq!(
            serde_json::from_str::<Value>(&seen[3].body).unwrap(),
            serde_json::json!({"appname": "web", "podname": "intra", "nodename": "node-2"})
        );
    }

    #[test]
    fn log_for_unknown_node_sends_no_stream_request() {
        let (host, server) = serve_sequence(vec![
            (200, r#"[{"name":"dev"}]"#.to_string()),
            (200, r#"[{"name":"node-0"}]"#.to_string()),
        ]);

        let err = client(&host).log("node-9", "web").err().expect("node is unknown");

        assert!(matches!(
            err,
            ApiError::Config(ConfigError::UnknownNode(ref node)) if node == "node-9"
        ));
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn request_decodes_json_and_sends_params() {
        let (host, server) = serve_once(200, r#"{"name":"web","git":"git@x:y/z.git"}"#);

        let app = client(&host).request("GET", "/app/web", &[("limit", "20")], None).unwrap();
        assert_eq!(app["name"], "web");

        let seen = server.join().unwrap();
        assert_eq!(seen.method, "GET");
        assert!(seen.url.contains("limit=20"));
        assert!(!seen.url.contains("limit=100"));
        assert!(seen.url.contains("start=0"));
    }

    #[test]
    fn non_json_success_body_is_remote_error() {
        let (host, server) = serve_once(200, "<html>oops</html>");

        let err = client(&host).get_pods().unwrap_err();
        assert!(matches!(err, ApiError::Remote { code: 200, .. }));
        assert!(err.to_string().contains("<html>oops</html>"));
        server.join().unwrap();
    }

    #[test]
    fn set_app_env_sends_vars_as_body() {
        let (host, server) = serve_once(200, "{}");
        let mut vars = Map::new();
        vars.insert("DEBUG".to_string(), Value::from("1"));

        client(&host).set_app_env("web", "prod", &vars).unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen.method, "PUT");
        assert!(seen.url.starts_with("/api/v1/app/web/env/prod"));
        assert_eq!(
            serde_json::from_str::<Value>(&seen.body).unwrap(),
            serde_json::json!({"DEBUG": "1"})
        );
    }

    #[test]
    fn wire_log_captures_request_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let (host, server) = serve_once(200, "{\"success\":true,\"id\":\"id1\"}\n");
        let request = RemoveRequest::new("id1").unwrap();

        let count = client(&host)
            .with_wire_log_dir(dir.path())
            .remove(&request)
            .unwrap()
            .count();
        assert_eq!(count, 1);
        server.join().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let contents = std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert!(contents.contains(r#"SEND: {"ids":["id1"]}"#));
        assert!(contents.contains(r#"RECV: {"success":true,"id":"id1"}"#));
    }
}
