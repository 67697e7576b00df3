/// Anything that stops the process before or during deployment.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("deployment failed: {0}")]
    Deploy(#[from] DeployError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("invalid agent definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("API returned {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("failed to package agent source: {0}")]
    Package(String),
    #[error("operation failed ({code}): {message}")]
    Operation { code: i64, message: String },
    #[error("deployment cancelled while waiting for the operation")]
    Cancelled,
}

/// The agent definition broke one of its own invariants.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
    #[error("tool {tool}: parameter `{param}` is declared but never sent")]
    UnusedParameter { tool: String, param: String },
    #[error("tool {tool}: body field `{field}` reads undeclared parameter `{param}`")]
    UnknownParameter {
        tool: String,
        field: String,
        param: String,
    },
}

/// Raised while rendering a tool's request body from sample input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("missing required argument `{0}`")]
    MissingArgument(String),
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },
}
