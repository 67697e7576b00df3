use serde::Deserialize;
use serde_json::Value;

use crate::config::Secret;

/// Fully-formed deployment. The host just ships it.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub display_name: String,
    pub description: String,
    /// Bucket name without the `gs://` scheme.
    pub staging_bucket: String,
    /// pip requirements for the hosted runtime.
    pub requirements: Vec<String>,
    /// Serialized agent definition (`agent.json`).
    pub agent: Value,
    /// Environment variables set in the hosted runtime. Carries the HR credentials.
    pub env: Vec<(String, EnvValue)>,
}

/// How a runtime environment variable gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    /// Stored on the engine resource as-is.
    Plain(Secret),
    /// Secret Manager secret the service resolves when the runtime starts.
    SecretRef { secret: String, version: String },
}

/// What came back from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    /// e.g. `projects/p/locations/l/reasoningEngines/123`.
    pub resource_name: String,
}

/// A Google long-running operation, as returned by create and by polling.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationStatus>,
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}
