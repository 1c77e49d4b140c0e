//! Background job processing for accepted scrape requests.
//!
//! HTTP handlers only validate and enqueue; a single worker drains the queue
//! and records each job's progress in a [`JobRegistry`].

mod error;
mod registry;
mod runner;

pub use error::QueueError;
pub use registry::{JobRecord, JobRegistry, JobState};
pub use runner::{JobHandler, JobQueue};
