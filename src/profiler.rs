//! Profiling agent bootstrap.
//!
//! Prepares everything the agent needs before it starts dumping: the dump
//! directory and the agent command string. Attaching the agent to the process
//! is left to the host.

use std::path::PathBuf;

use crate::config::ProfilerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    #[error("Failed to create dump directory '{}': {source}", directory.display())]
    CreateDir {
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Create the dump directory (if `file` names one) and return the agent command.
pub async fn prepare(config: &ProfilerConfig) -> Result<String, ProfilerError> {
    if let Some(parent) = config.dump_parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ProfilerError::CreateDir {
                directory: parent.to_path_buf(),
                source,
            })?;
    }

    let command = config.agent_command();
    tracing::info!(
        event = %config.event,
        file = %config.file,
        "Profiler agent command prepared: {}",
        command
    );
    Ok(command)
}
