//! Work queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is full ({0} jobs waiting)")]
    Full(usize),
    #[error("Job worker is not running")]
    Closed,
}
