use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::auth::{token_provider, TokenProvider};
use super::bundle::{self, ENTRYPOINT_MODULE, ENTRYPOINT_OBJECT, REQUIREMENTS_FILE};
use super::AgentHost;
use crate::config::{Config, Secret};
use crate::error::DeployError;
use crate::redaction::Redactor;
use crate::types::{DeploymentRequest, EnvValue, Operation};

const STORAGE_BASE: &str = "https://storage.googleapis.com";
const PYTHON_VERSION: &str = "3.11";

/// Vertex AI Agent Engine over REST. Builds the source archive, keeps a copy in
/// the staging bucket, creates a reasoning engine from it and polls the
/// long-running operation.
pub struct AgentEngineHost {
    client: reqwest::Client,
    project_id: String,
    location: String,
    api_base: String,
    storage_base: String,
    tokens: Box<dyn TokenProvider>,
    poll_interval: Duration,
    redactor: Redactor,
    cancel: CancellationToken,
}

impl AgentEngineHost {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            project_id: config.project_id.clone(),
            location: config.location.clone(),
            api_base: format!("https://{}-aiplatform.googleapis.com", config.location),
            storage_base: STORAGE_BASE.into(),
            tokens: token_provider(config),
            poll_interval: config.poll_interval,
            redactor: Redactor::from_config(config),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_storage_base(mut self, url: impl Into<String>) -> Self {
        self.storage_base = url.into();
        self
    }

    pub fn with_token_provider(mut self, tokens: impl TokenProvider + 'static) -> Self {
        self.tokens = Box::new(tokens);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Stop waiting on the operation once this token fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn engines_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/reasoningEngines",
            self.api_base, self.project_id, self.location
        )
    }

    fn operation_url(&self, name: &str) -> String {
        format!("{}/v1/{}", self.api_base, name)
    }

    /// Upload one object and return its `gs://` URI.
    async fn upload(
        &self,
        token: &Secret,
        bucket: &str,
        object: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, DeployError> {
        let resp = self
            .client
            .post(format!("{}/upload/storage/v1/b/{}/o", self.storage_base, bucket))
            .query(&[("uploadType", "media"), ("name", object)])
            .bearer_auth(token.expose())
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| DeployError::Request(e.to_string()))?;
        self.read_body(resp).await?;

        let uri = format!("gs://{bucket}/{object}");
        debug!(%uri, "staged object");
        Ok(uri)
    }

    async fn submit(&self, token: &Secret, body: &Value) -> Result<Operation, DeployError> {
        let resp = self
            .client
            .post(self.engines_url())
            .bearer_auth(token.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| DeployError::Request(e.to_string()))?;
        let text = self.read_body(resp).await?;
        serde_json::from_str(&text).map_err(|e| DeployError::Parse(e.to_string()))
    }

    async fn poll(&self, token: &Secret, name: &str) -> Result<Operation, DeployError> {
        let resp = self
            .client
            .get(self.operation_url(name))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| DeployError::Request(e.to_string()))?;
        let text = self.read_body(resp).await?;
        serde_json::from_str(&text).map_err(|e| DeployError::Parse(e.to_string()))
    }

    async fn read_body(&self, resp: reqwest::Response) -> Result<String, DeployError> {
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| DeployError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(DeployError::ApiError {
                status,
                body: self.redactor.redact(&text),
            });
        }
        Ok(text)
    }

    async fn wait(&self, token: &Secret, mut op: Operation) -> Result<String, DeployError> {
        let started = Instant::now();
        loop {
            if let Some(outcome) = operation_outcome(&op) {
                return outcome.map_err(|e| match e {
                    DeployError::Operation { code, message } => DeployError::Operation {
                        code,
                        message: self.redactor.redact(&message),
                    },
                    other => other,
                });
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(operation = %op.name, "stopped waiting; the operation may still complete");
                    return Err(DeployError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            op = self.poll(token, &op.name).await?;
            info!(
                operation = %op.name,
                elapsed_secs = started.elapsed().as_secs(),
                done = op.done,
                "polled deployment"
            );
        }
    }
}

/// The `reasoningEngines.create` payload. The agent ships as inline source:
/// a tar.gz whose entrypoint module builds the ADK app from `agent.json`.
pub fn create_body(request: &DeploymentRequest, archive: &[u8]) -> Value {
    let mut env = Vec::new();
    let mut secret_env = Vec::new();
    for (name, value) in &request.env {
        match value {
            EnvValue::Plain(v) => env.push(json!({ "name": name, "value": v.expose() })),
            EnvValue::SecretRef { secret, version } => secret_env.push(json!({
                "name": name,
                "secretRef": { "secret": secret, "version": version },
            })),
        }
    }

    json!({
        "displayName": request.display_name,
        "description": request.description,
        "spec": {
            "agentFramework": "google-adk",
            "sourceCodeSpec": {
                "inlineSource": {
                    "sourceArchive": BASE64.encode(archive),
                },
                "pythonSpec": {
                    "version": PYTHON_VERSION,
                    "entrypointModule": ENTRYPOINT_MODULE,
                    "entrypointObject": ENTRYPOINT_OBJECT,
                    "requirementsFile": REQUIREMENTS_FILE,
                },
            },
            "deploymentSpec": {
                "env": env,
                "secretEnv": secret_env,
            },
        },
    })
}

/// `None` while the operation is still running.
pub fn operation_outcome(op: &Operation) -> Option<Result<String, DeployError>> {
    if !op.done {
        return None;
    }
    if let Some(ref status) = op.error {
        return Some(Err(DeployError::Operation {
            code: status.code,
            message: status.message.clone(),
        }));
    }

    let from_response = op
        .response
        .as_ref()
        .and_then(|r| r["name"].as_str())
        .map(str::to_string);
    // Operation names are `<resource>/operations/<id>`.
    let from_operation = op
        .name
        .split_once("/operations/")
        .map(|(resource, _)| resource.to_string());

    Some(
        from_response
            .or(from_operation)
            .ok_or_else(|| DeployError::Parse(format!("no resource name in operation {}", op.name))),
    )
}

/// Per-deployment object prefix so concurrent or repeated runs never collide.
fn staging_prefix() -> String {
    format!(
        "agent_engine/{}",
        chrono::Utc::now().format("%Y%m%d-%H%M%S-%f")
    )
}

#[async_trait]
impl AgentHost for AgentEngineHost {
    async fn create(&self, request: &DeploymentRequest) -> Result<String, DeployError> {
        let archive = bundle::source_archive(request)?;
        debug!(bytes = archive.len(), "packaged agent source");

        let token = self.tokens.token().await?;
        let staged = self
            .upload(
                &token,
                &request.staging_bucket,
                &format!("{}/source.tar.gz", staging_prefix()),
                "application/gzip",
                archive.clone(),
            )
            .await?;
        info!(%staged, "staged agent source");

        let body = create_body(request, &archive);
        let op = self.submit(&token, &body).await?;
        info!(operation = %op.name, "create submitted, waiting for the engine to come up");

        self.wait(&token, op).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::full_vars;
    use crate::deployer::build_request;
    use crate::host::auth::StaticToken;
    use crate::types::OperationStatus;
    use chrono::NaiveDate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn op(done: bool) -> Operation {
        Operation {
            name: "projects/p/locations/l/reasoningEngines/123/operations/987".into(),
            done,
            error: None,
            response: None,
        }
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            display_name: "darwinbox-hr-agent-full".into(),
            description: "HR agent".into(),
            staging_bucket: "acme-hr-agent-engine-staging".into(),
            requirements: vec!["requests>=2.31.0".into()],
            agent: json!({"name": "a"}),
            env: vec![
                (
                    "DARWINBOX_USERNAME".into(),
                    EnvValue::Plain(Secret::new("svc-agent")),
                ),
                (
                    "LEAVE_REPORT_KEY".into(),
                    EnvValue::SecretRef {
                        secret: "hr-agent-LEAVE_REPORT_KEY".into(),
                        version: "latest".into(),
                    },
                ),
            ],
        }
    }

    #[test]
    fn running_operation_has_no_outcome() {
        assert!(operation_outcome(&op(false)).is_none());
    }

    #[test]
    fn resource_name_from_response() {
        let mut done = op(true);
        done.response = Some(json!({
            "@type": "type.googleapis.com/google.cloud.aiplatform.v1.ReasoningEngine",
            "name": "projects/p/locations/l/reasoningEngines/456",
        }));
        let name = operation_outcome(&done).unwrap().unwrap();
        assert_eq!(name, "projects/p/locations/l/reasoningEngines/456");
    }

    #[test]
    fn resource_name_falls_back_to_operation_prefix() {
        let name = operation_outcome(&op(true)).unwrap().unwrap();
        assert_eq!(name, "projects/p/locations/l/reasoningEngines/123");
    }

    #[test]
    fn failed_operation_is_error() {
        let mut failed = op(true);
        failed.error = Some(OperationStatus {
            code: 8,
            message: "Quota exceeded".into(),
        });
        match operation_outcome(&failed) {
            Some(Err(DeployError::Operation { code, message })) => {
                assert_eq!(code, 8);
                assert_eq!(message, "Quota exceeded");
            }
            other => panic!("expected operation error, got {other:?}"),
        }
    }

    #[test]
    fn operation_parses_from_json() {
        let parsed: Operation = serde_json::from_str(
            r#"{"name":"projects/p/locations/l/reasoningEngines/1/operations/2","metadata":{}}"#,
        )
        .unwrap();
        assert!(!parsed.done);
        assert!(parsed.error.is_none());
    }

    #[test]
    fn create_body_ships_inline_source_with_entrypoint() {
        let body = create_body(&request(), b"archive-bytes");
        assert_eq!(body["displayName"], "darwinbox-hr-agent-full");
        assert_eq!(body["spec"]["agentFramework"], "google-adk");
        assert!(body["spec"].get("packageSpec").is_none());

        let source = &body["spec"]["sourceCodeSpec"];
        assert_eq!(
            source["inlineSource"]["sourceArchive"],
            BASE64.encode(b"archive-bytes")
        );
        assert_eq!(source["pythonSpec"]["version"], PYTHON_VERSION);
        assert_eq!(source["pythonSpec"]["entrypointModule"], "hr_agent");
        assert_eq!(source["pythonSpec"]["entrypointObject"], "app");
        assert_eq!(source["pythonSpec"]["requirementsFile"], "requirements.txt");
    }

    #[test]
    fn create_body_splits_plain_and_secret_env() {
        let body = create_body(&request(), b"x");
        let deployment = &body["spec"]["deploymentSpec"];
        assert_eq!(
            deployment["env"],
            json!([{"name": "DARWINBOX_USERNAME", "value": "svc-agent"}])
        );
        assert_eq!(
            deployment["secretEnv"],
            json!([{
                "name": "LEAVE_REPORT_KEY",
                "secretRef": {"secret": "hr-agent-LEAVE_REPORT_KEY", "version": "latest"},
            }])
        );
    }

    #[test]
    fn urls_follow_location() {
        let config = Config::from_source(&full_vars()).unwrap();
        let host = AgentEngineHost::new(&config);
        assert_eq!(
            host.engines_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/acme-hr/locations/us-central1/reasoningEngines"
        );
        assert_eq!(
            host.operation_url("projects/p/locations/l/operations/1"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/l/operations/1"
        );
    }

    #[test]
    fn staging_prefixes_are_distinct() {
        let a = staging_prefix();
        std::thread::sleep(Duration::from_millis(2));
        let b = staging_prefix();
        assert_ne!(a, b);
        assert!(a.starts_with("agent_engine/"));
    }

    #[tokio::test]
    async fn cancelled_wait_stops_polling() {
        let config = Config::from_source(&full_vars()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Unroutable base: any poll would fail with Request, not Cancelled.
        let host = AgentEngineHost::new(&config)
            .with_api_base("http://127.0.0.1:9")
            .with_cancel(cancel);
        let err = host
            .wait(&Secret::new("t"), op(false))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Cancelled));
    }

    // --- Loopback server ---

    /// One request as the loopback server saw it. `head` is lowercased.
    struct Seen {
        method: String,
        target: String,
        head: String,
        body: Vec<u8>,
    }

    async fn read_request(stream: &mut TcpStream) -> Seen {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while buf.len() < head_end + length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut request_line = head.lines().next().unwrap().split(' ');
        Seen {
            method: request_line.next().unwrap().to_string(),
            target: request_line.next().unwrap().to_string(),
            head: head.to_lowercase(),
            body: buf[head_end..head_end + length].to_vec(),
        }
    }

    /// Answers one connection per canned `(status, body)` and returns what it saw.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Seen>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            seen
        });
        (base, handle)
    }

    fn loopback_host(base: &str) -> AgentEngineHost {
        let config = Config::from_source(&full_vars()).unwrap();
        AgentEngineHost::new(&config)
            .with_client(reqwest::Client::builder().no_proxy().build().unwrap())
            .with_api_base(base)
            .with_storage_base(base)
            .with_token_provider(StaticToken::new(Secret::new("test-token")))
            .with_poll_interval(Duration::from_millis(5))
    }

    fn deployment() -> DeploymentRequest {
        let config = Config::from_source(&full_vars()).unwrap();
        build_request(&config, NaiveDate::from_ymd_opt(2025, 11, 6).unwrap()).unwrap()
    }

    const OPERATION: &str = "projects/acme-hr/locations/us-central1/reasoningEngines/77/operations/1";

    #[tokio::test]
    async fn create_stages_submits_and_polls_to_done() {
        let (base, server) = serve(vec![
            (200, "{}"),
            (
                200,
                r#"{"name":"projects/acme-hr/locations/us-central1/reasoningEngines/77/operations/1"}"#,
            ),
            (
                200,
                r#"{"name":"projects/acme-hr/locations/us-central1/reasoningEngines/77/operations/1","done":true,"response":{"name":"projects/acme-hr/locations/us-central1/reasoningEngines/77"}}"#,
            ),
        ])
        .await;

        let name = loopback_host(&base).create(&deployment()).await.unwrap();
        assert_eq!(name, "projects/acme-hr/locations/us-central1/reasoningEngines/77");

        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 3);

        let upload = &seen[0];
        assert_eq!(upload.method, "POST");
        assert!(upload
            .target
            .starts_with("/upload/storage/v1/b/acme-hr-agent-engine-staging/o?"));
        assert!(upload.target.contains("uploadType=media"));
        assert!(upload.target.contains("source.tar.gz"));
        assert!(upload.head.contains("authorization: bearer test-token"));
        assert!(upload.head.contains("content-type: application/gzip"));
        assert_eq!(upload.body[..2], [0x1f_u8, 0x8b]);

        let submit = &seen[1];
        assert_eq!(submit.method, "POST");
        assert_eq!(
            submit.target,
            "/v1/projects/acme-hr/locations/us-central1/reasoningEngines"
        );
        let body: Value = serde_json::from_slice(&submit.body).unwrap();
        let archive = body["spec"]["sourceCodeSpec"]["inlineSource"]["sourceArchive"]
            .as_str()
            .unwrap();
        assert_eq!(BASE64.decode(archive).unwrap(), upload.body);
        assert_eq!(
            body["spec"]["deploymentSpec"]["env"].as_array().unwrap().len(),
            19
        );

        let poll = &seen[2];
        assert_eq!(poll.method, "GET");
        assert_eq!(poll.target, format!("/v1/{OPERATION}"));
    }

    #[tokio::test]
    async fn rejected_upload_is_redacted_and_stops() {
        let (base, server) = serve(vec![(
            403,
            r#"{"error":{"message":"denied for svc-agent using hunter2-password"}}"#,
        )])
        .await;

        let err = loopback_host(&base)
            .create(&deployment())
            .await
            .unwrap_err();
        match err {
            DeployError::ApiError { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("[REDACTED]"));
                assert!(!body.contains("hunter2-password"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_operation_surfaces_after_polling() {
        let (base, server) = serve(vec![
            (200, "{}"),
            (
                200,
                r#"{"name":"projects/acme-hr/locations/us-central1/reasoningEngines/77/operations/1"}"#,
            ),
            (
                200,
                r#"{"name":"projects/acme-hr/locations/us-central1/reasoningEngines/77/operations/1","done":true,"error":{"code":8,"message":"Quota exceeded"}}"#,
            ),
        ])
        .await;

        let err = loopback_host(&base)
            .create(&deployment())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Operation { code: 8, ref message } if message == "Quota exceeded"));
        assert_eq!(server.await.unwrap().len(), 3);
    }
}
