use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Checks whether diagram text parses.
///
/// Never fails: any problem running the check counts as "does not parse".
#[async_trait]
pub trait DiagramValidator: Send + Sync {
    async fn validate(&self, text: &str) -> bool;
}

/// Validates Mermaid text by rendering it with the `mmdc` CLI.
pub struct MmdcValidator {
    binary: PathBuf,
}

impl MmdcValidator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn render(&self, text: &str) -> io::Result<bool> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("diagram.mmd");
        let output = workdir.path().join("diagram.svg");
        tokio::fs::write(&input, text).await?;

        let result = Command::new(&self.binary)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            tracing::debug!(
                exit_code = result.status.code(),
                stderr = %String::from_utf8_lossy(&result.stderr),
                "mmdc rejected diagram"
            );
        }
        Ok(result.status.success())
    }
}

#[async_trait]
impl DiagramValidator for MmdcValidator {
    async fn validate(&self, text: &str) -> bool {
        match self.render(text).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!(
                    binary = %self.binary.display(),
                    error = %e,
                    "Diagram validation could not run"
                );
                false
            }
        }
    }
}
