use async_trait::async_trait;
use tracing::debug;

use crate::config::{Config, Secret};
use crate::error::DeployError;

/// Supplies OAuth bearer tokens for Google APIs. Credentials themselves are
/// managed out of band.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<Secret, DeployError>;
}

/// A token handed over in configuration.
pub struct StaticToken(Secret);

impl StaticToken {
    pub fn new(token: Secret) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<Secret, DeployError> {
        Ok(self.0.clone())
    }
}

/// Asks the gcloud CLI for the active account's token.
pub struct GcloudToken {
    program: String,
}

impl GcloudToken {
    pub fn new() -> Self {
        Self {
            program: "gcloud".into(),
        }
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for GcloudToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenProvider for GcloudToken {
    async fn token(&self) -> Result<Secret, DeployError> {
        debug!(program = %self.program, "requesting access token");
        let output = tokio::process::Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| DeployError::Auth(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Auth(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(DeployError::Auth(format!(
                "{} printed no access token",
                self.program
            )));
        }
        Ok(Secret::new(token))
    }
}

/// Static token when configured, gcloud otherwise.
pub fn token_provider(config: &Config) -> Box<dyn TokenProvider> {
    match config.access_token {
        Some(ref token) => Box::new(StaticToken::new(token.clone())),
        None => Box::new(GcloudToken::new()),
    }
}
