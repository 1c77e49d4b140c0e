//! `.doc` to PDF conversion with headless LibreOffice.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{
    converted_output_path, place_output, run_tool, scratch_dir, DocumentConverter, ToolError,
};

pub struct LibreOfficeConverter {
    binary: PathBuf,
    timeout: Duration,
}

impl LibreOfficeConverter {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl DocumentConverter for LibreOfficeConverter {
    async fn convert(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let preferred = converted_output_path(path);
        let outdir = scratch_dir(path, ".convert-")?;
        // A private profile lets conversions run while another soffice is open.
        let profile = tempfile::Builder::new()
            .prefix("tenderscrape-soffice-")
            .tempdir()?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!(
            "-env:UserInstallation=file://{}",
            profile.path().display()
        ))
        .args(["--headless", "--convert-to", "pdf", "--outdir"])
        .arg(outdir.path())
        .arg(path);
        run_tool("soffice", &mut cmd, self.timeout).await?;

        // soffice exits 0 even when it couldn't read the input.
        let expected = match preferred.file_name() {
            Some(name) => outdir.path().join(name),
            None => outdir.path().join("output.pdf"),
        };
        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Err(ToolError::MissingOutput {
                tool: "soffice",
                expected: preferred,
            });
        }
        place_output(&expected, &preferred).await
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}
