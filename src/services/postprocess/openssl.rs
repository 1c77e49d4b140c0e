//! `.p7m` envelope extraction with `openssl smime`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{
    envelope_output_path, place_output, run_tool, scratch_dir, EnvelopeVerifier, ToolError,
};

/// Extracts signed payloads without validating the signer chain.
pub struct OpensslVerifier {
    binary: PathBuf,
    timeout: Duration,
}

impl OpensslVerifier {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    async fn extract(&self, input: &Path, output: &Path, inform: &str) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["smime", "-verify", "-noverify", "-inform", inform, "-in"])
            .arg(input)
            .arg("-out")
            .arg(output);
        run_tool("openssl", &mut cmd, self.timeout).await.map(|_| ())
    }
}

#[async_trait]
impl EnvelopeVerifier for OpensslVerifier {
    async fn verify(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let preferred = envelope_output_path(path);
        let scratch = scratch_dir(path, ".unwrap-")?;
        let output = match preferred.file_name() {
            Some(name) => scratch.path().join(name),
            None => scratch.path().join("payload"),
        };

        // Portals serve both binary and base64 envelopes.
        match self.extract(path, &output, "DER").await {
            Err(ToolError::Failed { message, .. }) => {
                debug!("DER extraction failed for {}: {}", path.display(), message);
                self.extract(path, &output, "PEM").await?;
            }
            other => other?,
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(ToolError::MissingOutput {
                tool: "openssl",
                expected: preferred,
            });
        }
        place_output(&output, &preferred).await
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}
