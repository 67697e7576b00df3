//! Deploys the Darwinbox HR agent to Vertex AI Agent Engine.
//!
//! Usage:
//!   hr-agent-deploy                 # reads ./.env, then the process environment
//!   RUST_LOG=debug hr-agent-deploy
//!
//! Prints the reasoning engine resource name on success. Ctrl-C stops waiting
//! on the remote operation; the engine may still finish provisioning.

use std::process::ExitCode;

use hr_agent_deploy::{run, AgentEngineHost, Config};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted");
            on_interrupt.cancel();
        }
    });

    let result = run(Config::load, |config| {
        AgentEngineHost::new(config).with_cancel(cancel.clone())
    })
    .await;

    match result {
        Ok(deployment) => {
            println!("{}", deployment.resource_name);
            info!(
                resource_name = %deployment.resource_name,
                "register this resource with the discovery engine to expose the agent"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "deployment aborted");
            eprintln!("error: {e}");
            eprintln!("check permissions, project configuration and the staging bucket");
            ExitCode::FAILURE
        }
    }
}
