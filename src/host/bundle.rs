//! The source archive Agent Engine builds the hosted agent from: the agent
//! manifest, pip requirements and the ADK entrypoint module that reads them.

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::DeployError;
use crate::types::DeploymentRequest;

/// Python module the service imports.
pub const ENTRYPOINT_MODULE: &str = "hr_agent";
/// Object inside [`ENTRYPOINT_MODULE`] the service serves.
pub const ENTRYPOINT_OBJECT: &str = "app";
pub const MANIFEST_FILE: &str = "agent.json";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

const ENTRYPOINT_SOURCE: &str = include_str!("../../runtime/hr_agent.py");

fn package_err(e: impl std::fmt::Display) -> DeployError {
    DeployError::Package(e.to_string())
}

/// Gzipped tar of everything the hosted runtime needs. Holds no credential
/// values; those arrive through the deployment env.
pub fn source_archive(request: &DeploymentRequest) -> Result<Vec<u8>, DeployError> {
    let manifest = serde_json::to_vec_pretty(&request.agent).map_err(package_err)?;
    let mut requirements = request.requirements.join("\n");
    requirements.push('\n');

    let entries = [
        (format!("{ENTRYPOINT_MODULE}.py"), ENTRYPOINT_SOURCE.as_bytes()),
        (MANIFEST_FILE.to_string(), manifest.as_slice()),
        (REQUIREMENTS_FILE.to_string(), requirements.as_bytes()),
    ];

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in &entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, *data)
            .map_err(package_err)?;
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(package_err)
}
