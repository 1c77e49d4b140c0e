//! Service layer for tenderscrape.
//!
//! The pieces the pipeline is assembled from, kept free of HTTP and CLI
//! concerns so the server, the CLI and tests can share them.

pub mod download;
pub mod pipeline;
pub mod postprocess;
pub mod upload;
pub mod webhook;

pub use pipeline::{AnnouncementOutcome, OutcomeStage, Pipeline, PipelineError, ScrapeRequest};
pub use postprocess::PostProcessor;
pub use webhook::WebhookClient;
