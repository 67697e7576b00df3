use chrono::NaiveDate;
use tracing::info;

use crate::agent::AgentDefinition;
use crate::config::{Config, Secret, DARWINBOX_PASSWORD, DARWINBOX_USERNAME};
use crate::error::DeployError;
use crate::host::AgentHost;
use crate::types::{DeploymentRequest, DeploymentResult, EnvValue};

pub const DISPLAY_NAME: &str = "darwinbox-hr-agent-full";
pub const DESCRIPTION: &str =
    "Comprehensive HR agent for Darwinbox (Leave, Attendance, and Employee Directory)";

/// Python requirements installed in the hosted runtime.
pub const REQUIREMENTS: [&str; 3] = [
    "google-cloud-aiplatform[agent_engines,adk]>=1.55.0",
    "google-adk>=0.1.0",
    "requests>=2.31.0",
];

/// Bucket used for packaging, derived from the project id.
pub fn staging_bucket(project_id: &str) -> String {
    format!("{project_id}-agent-engine-staging")
}

pub fn staging_uri(project_id: &str) -> String {
    format!("gs://{}", staging_bucket(project_id))
}

/// Credentials the deployed tools read at call time. With a secret prefix
/// configured the password and API keys become Secret Manager references and
/// their values never leave this process.
fn runtime_env(config: &Config) -> Vec<(String, EnvValue)> {
    let credential = |name: &str, value: &Secret| match config.secret_prefix {
        Some(ref prefix) => EnvValue::SecretRef {
            secret: format!("{prefix}{name}"),
            version: "latest".into(),
        },
        None => EnvValue::Plain(value.clone()),
    };

    let mut env = vec![
        (
            DARWINBOX_USERNAME.to_string(),
            EnvValue::Plain(Secret::new(config.hr.username.clone())),
        ),
        (
            DARWINBOX_PASSWORD.to_string(),
            credential(DARWINBOX_PASSWORD, &config.hr.password),
        ),
    ];
    env.extend(config.hr.api_keys().map(|(key, value)| {
        (
            key.env_name().to_string(),
            credential(key.env_name(), value),
        )
    }));
    env
}

/// Assemble and validate everything the host needs. No I/O.
pub fn build_request(config: &Config, today: NaiveDate) -> Result<DeploymentRequest, DeployError> {
    let definition = AgentDefinition::darwinbox(config, today);
    definition.validate()?;
    info!(
        agent = %definition.name,
        model = %definition.model,
        tools = definition.tools.len(),
        "agent definition complete"
    );

    Ok(DeploymentRequest {
        display_name: DISPLAY_NAME.into(),
        description: DESCRIPTION.into(),
        staging_bucket: staging_bucket(&config.project_id),
        requirements: REQUIREMENTS.iter().map(|r| r.to_string()).collect(),
        agent: definition.manifest(config),
        env: runtime_env(config),
    })
}

/// Build the agent and hand it to the host once. Errors are returned as-is;
/// nothing is retried.
pub async fn deploy(
    config: &Config,
    host: &dyn AgentHost,
) -> Result<DeploymentResult, DeployError> {
    deploy_on(config, host, chrono::Local::now().date_naive()).await
}

/// [`deploy`] with an explicit date for the system instruction.
pub async fn deploy_on(
    config: &Config,
    host: &dyn AgentHost,
    today: NaiveDate,
) -> Result<DeploymentResult, DeployError> {
    let request = build_request(config, today)?;
    info!(
        project = %config.project_id,
        location = %config.location,
        staging = %staging_uri(&config.project_id),
        "deploying to agent engine, this may take 15-20 minutes"
    );

    let resource_name = host.create(&request).await?;
    info!(%resource_name, "deployment successful");
    Ok(DeploymentResult { resource_name })
}
