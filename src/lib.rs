pub mod agent;
pub mod config;
pub mod deployer;
pub mod error;
pub mod host;
pub mod prompt;
pub mod redaction;
pub mod tools;
pub mod types;

use tracing::info;

pub use agent::AgentDefinition;
pub use config::{ApiKey, Config, ConfigSource, ProcessEnv, Secret};
pub use deployer::{build_request, deploy, staging_bucket};
pub use error::{ConfigError, DefinitionError, DeployError, Error, ToolError};
pub use host::{AgentEngineHost, AgentHost};
pub use redaction::Redactor;
pub use tools::{hr_tools, ToolDefinition, ToolRegistry};
pub use types::{DeploymentRequest, DeploymentResult, EnvValue};

/// Load configuration, then deploy through the host built from it.
///
/// Configuration is resolved before the host exists, so a missing key never
/// reaches the network.
pub async fn run<L, F, H>(load: L, make_host: F) -> Result<DeploymentResult, Error>
where
    L: FnOnce() -> Result<Config, ConfigError>,
    F: FnOnce(&Config) -> H,
    H: AgentHost,
{
    info!("starting Darwinbox HR agent deployment");
    let config = load()?;
    info!(project = %config.project_id, location = %config.location, "configuration loaded");

    let host = make_host(&config);
    Ok(deploy(&config, &host).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::full_vars;
    use crate::deployer::tests::MockHost;
    use std::sync::Arc;

    /// Lets a test keep a handle on the host after `run` consumes its copy.
    struct Shared(Arc<MockHost>);

    #[async_trait::async_trait]
    impl AgentHost for Shared {
        async fn create(&self, request: &DeploymentRequest) -> Result<String, DeployError> {
            self.0.create(request).await
        }
    }

    #[tokio::test]
    async fn missing_key_never_reaches_host() {
        for key in config::required_keys() {
            let mut vars = full_vars();
            vars.remove(key);
            let host = Arc::new(MockHost::new(vec![Ok("unused".into())]));

            let handle = host.clone();
            let result = run(|| Config::from_source(&vars), move |_| Shared(handle)).await;

            assert!(
                matches!(result, Err(Error::Config(ConfigError::Missing(_)))),
                "{key} should fail configuration"
            );
            assert_eq!(host.calls().await, 0, "{key} reached the host");
        }
    }

    #[tokio::test]
    async fn full_run_returns_resource_name() {
        let vars = full_vars();
        let host = MockHost::new(vec![Ok(
            "projects/p/locations/l/reasoningEngines/123".into()
        )]);
        let result = run(|| Config::from_source(&vars), |_| host).await.unwrap();
        assert_eq!(
            result.resource_name,
            "projects/p/locations/l/reasoningEngines/123"
        );
    }

    #[tokio::test]
    async fn deploy_failure_message_preserved() {
        let vars = full_vars();
        let host = MockHost::new(vec![Err(DeployError::Operation {
            code: 8,
            message: "Quota exceeded for reasoning engines".into(),
        })]);
        let err = run(|| Config::from_source(&vars), |_| host)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Deploy(DeployError::Operation { code: 8, .. })));
        assert_eq!(
            err.to_string(),
            "deployment failed: operation failed (8): Quota exceeded for reasoning engines"
        );
    }

    #[tokio::test]
    async fn host_sees_configured_project() {
        let vars = full_vars();
        let mut seen = None;
        let host = MockHost::new(vec![Ok("projects/p/locations/l/reasoningEngines/5".into())]);
        run(
            || Config::from_source(&vars),
            |config| {
                seen = Some(config.project_id.clone());
                host
            },
        )
        .await
        .unwrap();
        assert_eq!(seen.as_deref(), Some("acme-hr"));
    }
}
