//! Bounded job queue with a single background worker.
//!
//! Jobs run strictly in submission order. Each job body runs in its own task
//! so that a panic is caught at the join and recorded as a failed job while
//! the worker keeps going.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use super::error::QueueError;
use super::registry::{JobRecord, JobRegistry};
use crate::services::{AnnouncementOutcome, Pipeline, ScrapeRequest};

/// Executes one job body.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, request: ScrapeRequest) -> Vec<AnnouncementOutcome>;
}

#[async_trait]
impl JobHandler for Pipeline {
    async fn handle(&self, request: ScrapeRequest) -> Vec<AnnouncementOutcome> {
        self.run(request).await
    }
}

struct Job {
    id: Uuid,
    request: ScrapeRequest,
}

/// Submission side of the queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    registry: JobRegistry,
    capacity: usize,
}

impl JobQueue {
    /// Create the queue and spawn its worker.
    pub fn start(capacity: usize, handler: Arc<dyn JobHandler>) -> (Self, JoinHandle<()>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let registry = JobRegistry::new();
        let worker = tokio::spawn(run_worker(rx, registry.clone(), handler));
        (
            Self {
                tx,
                registry,
                capacity,
            },
            worker,
        )
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Enqueue without waiting. Returns the queued record.
    pub async fn submit(&self, request: ScrapeRequest) -> Result<JobRecord, QueueError> {
        let id = Uuid::new_v4();
        let record = JobRecord::queued(id, request.kind(), request.targets());
        // Registered first so the worker can never see an unknown id.
        self.registry.insert(record.clone()).await;

        match self.tx.try_send(Job { id, request }) {
            Ok(()) => {
                info!("Queued {} job {} ({} targets)", record.kind, id, record.targets.len());
                Ok(record)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.registry.remove(id).await;
                Err(QueueError::Full(self.capacity))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.registry.remove(id).await;
                Err(QueueError::Closed)
            }
        }
    }
}

async fn run_worker(mut rx: mpsc::Receiver<Job>, registry: JobRegistry, handler: Arc<dyn JobHandler>) {
    while let Some(Job { id, request }) = rx.recv().await {
        registry.mark_running(id).await;
        info!("Starting job {} ({})", id, request.kind());

        let handler = handler.clone();
        let task = tokio::spawn(async move { handler.handle(request).await });

        match task.await {
            Ok(outcomes) => {
                info!("Job {} completed ({} announcements)", id, outcomes.len());
                registry.mark_completed(id, outcomes).await;
            }
            Err(e) => {
                let message = if e.is_panic() {
                    format!("job panicked: {}", panic_message(e.into_panic()))
                } else {
                    "job was cancelled".to_string()
                };
                error!("Job {} failed: {}", id, message);
                registry.mark_failed(id, message).await;
            }
        }
    }
    info!("Job queue closed; worker exiting");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
