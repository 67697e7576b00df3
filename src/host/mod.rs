pub mod agent_engine;
pub mod auth;
pub mod bundle;

use async_trait::async_trait;

use crate::error::DeployError;
use crate::types::DeploymentRequest;

/// The managed service that packages and runs the agent. One call, one new
/// hosted resource: `create` is not idempotent.
#[async_trait]
pub trait AgentHost: Send + Sync {
    /// Stage, create and wait. Returns the hosted resource name.
    async fn create(&self, request: &DeploymentRequest) -> Result<String, DeployError>;
}

/// Blanket impl so `Box<dyn AgentHost>` can be passed wherever a host is expected.
#[async_trait]
impl AgentHost for Box<dyn AgentHost> {
    async fn create(&self, request: &DeploymentRequest) -> Result<String, DeployError> {
        (**self).create(request).await
    }
}

pub use agent_engine::AgentEngineHost;
pub use auth::{token_provider, GcloudToken, StaticToken, TokenProvider};
