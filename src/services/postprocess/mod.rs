//! Post-download processing: signed envelope unwrap, then format conversion.
//!
//! Both steps only touch files with a matching extension and keep the
//! original when the external tool fails. The tools sit behind
//! [`EnvelopeVerifier`] and [`DocumentConverter`] so tests can stand in for
//! `openssl` and LibreOffice.

mod libreoffice;
mod openssl;

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub use libreoffice::LibreOfficeConverter;
pub use openssl::OpensslVerifier;

use crate::config::ToolSettings;
use crate::utils::{has_extension, unique_destination};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    NotAvailable(String),
    #[error("{tool} failed: {message}")]
    Failed { tool: &'static str, message: String },
    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    Timeout {
        tool: &'static str,
        timeout: Duration,
    },
    #[error("{tool} produced no {}", .expected.display())]
    MissingOutput {
        tool: &'static str,
        expected: PathBuf,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Strips a signature envelope, writing the payload next to the input.
///
/// Implementations never replace a file that already exists in the
/// input's directory: a taken name gets a counter suffix.
#[async_trait]
pub trait EnvelopeVerifier: Send + Sync {
    /// Extract the payload of `path` and return where it was written.
    async fn verify(&self, path: &Path) -> Result<PathBuf, ToolError>;

    fn is_available(&self) -> bool;
}

/// Converts a legacy document to PDF next to the input, with the same
/// collision rules as [`EnvelopeVerifier`].
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `path` and return the produced file.
    async fn convert(&self, path: &Path) -> Result<PathBuf, ToolError>;

    fn is_available(&self) -> bool;
}

/// Preferred payload location for an envelope: `contract.pdf.p7m` becomes `contract.pdf`.
pub fn envelope_output_path(path: &Path) -> PathBuf {
    match path.file_stem() {
        Some(stem) => path.with_file_name(stem),
        None => path.to_path_buf(),
    }
}

/// Preferred conversion target for a document: the `.pdf` sibling.
pub fn converted_output_path(path: &Path) -> PathBuf {
    path.with_extension("pdf")
}

/// Private directory next to `path` for a tool to write into.
///
/// Dropping it removes whatever the tool left behind and nothing else.
pub(crate) fn scratch_dir(path: &Path, prefix: &str) -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(parent_dir(path))
}

/// Move a tool's output from its scratch directory to `preferred`, or to the
/// next free counter name when `preferred` is taken.
pub(crate) async fn place_output(produced: &Path, preferred: &Path) -> Result<PathBuf, ToolError> {
    let name = preferred
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let destination = unique_destination(parent_dir(preferred), &name);
    tokio::fs::rename(produced, &destination).await?;
    Ok(destination)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Run an external tool with a time budget. A missing binary is `NotAvailable`.
pub(crate) async fn run_tool(
    tool: &'static str,
    cmd: &mut Command,
    timeout: Duration,
) -> Result<Output, ToolError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => Err(ToolError::Timeout { tool, timeout }),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolError::NotAvailable(
            format!("{} not found (is it installed?)", tool),
        )),
        Ok(Err(e)) => Err(ToolError::Io(e)),
        Ok(Ok(output)) if output.status.success() => Ok(output),
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ToolError::Failed {
                tool,
                message: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            })
        }
    }
}

/// Applies envelope unwrap then format conversion to downloaded files.
#[derive(Clone)]
pub struct PostProcessor {
    verifier: Arc<dyn EnvelopeVerifier>,
    converter: Arc<dyn DocumentConverter>,
}

impl PostProcessor {
    pub fn new(verifier: Arc<dyn EnvelopeVerifier>, converter: Arc<dyn DocumentConverter>) -> Self {
        Self {
            verifier,
            converter,
        }
    }

    /// `openssl` and LibreOffice as configured.
    pub fn from_settings(tools: &ToolSettings) -> Self {
        Self::new(
            Arc::new(OpensslVerifier::new(tools.openssl_bin.clone(), tools.timeout())),
            Arc::new(LibreOfficeConverter::new(tools.soffice_bin.clone(), tools.timeout())),
        )
    }

    pub fn verifier(&self) -> &dyn EnvelopeVerifier {
        self.verifier.as_ref()
    }

    pub fn converter(&self) -> &dyn DocumentConverter {
        self.converter.as_ref()
    }

    /// Unwrap `.p7m` files. Other files are returned untouched.
    pub async fn unwrap_envelope(&self, path: &Path) -> PathBuf {
        if !matches_extension(path, "p7m") {
            return path.to_path_buf();
        }

        match self.verifier.verify(path).await {
            Ok(payload) => {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!("Unwrapped {} but could not remove it: {}", path.display(), e);
                }
                info!("Unwrapped {} -> {}", path.display(), payload.display());
                payload
            }
            Err(e) => {
                warn!("Could not unwrap {}, keeping original: {}", path.display(), e);
                path.to_path_buf()
            }
        }
    }

    /// Convert `.doc` files to PDF. Other files are returned untouched.
    pub async fn convert_format(&self, path: &Path) -> PathBuf {
        if !matches_extension(path, "doc") {
            return path.to_path_buf();
        }

        match self.converter.convert(path).await {
            Ok(pdf) => {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!("Converted {} but could not remove it: {}", path.display(), e);
                }
                info!("Converted {} -> {}", path.display(), pdf.display());
                pdf
            }
            Err(e) => {
                warn!("Could not convert {}, keeping original: {}", path.display(), e);
                path.to_path_buf()
            }
        }
    }

    /// Run the whole chain and return the final artifact.
    pub async fn process(&self, path: &Path) -> PathBuf {
        let unwrapped = self.unwrap_envelope(path).await;
        let converted = self.convert_format(&unwrapped).await;
        if converted != path {
            debug!("Post-processed {} -> {}", path.display(), converted.display());
        }
        converted
    }
}

fn matches_extension(path: &Path, ext: &str) -> bool {
    path.file_name()
        .map(|n| has_extension(&n.to_string_lossy(), ext))
        .unwrap_or(false)
}
