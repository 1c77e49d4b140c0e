//! In-memory job records, observable through `GET /jobs/:id`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::AnnouncementOutcome;

/// Finished records kept before the oldest are pruned.
const MAX_FINISHED_RECORDS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: &'static str,
    pub state: JobState,
    pub targets: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<AnnouncementOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    pub fn queued(id: Uuid, kind: &'static str, targets: Vec<String>) -> Self {
        Self {
            id,
            kind,
            state: JobState::Queued,
            targets,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            outcomes: Vec::new(),
            error: None,
        }
    }
}

/// Shared job table.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: JobRecord) {
        self.jobs.write().await.insert(record.id, record);
    }

    pub async fn remove(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.write().await.remove(&id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn mark_running(&self, id: Uuid) {
        if let Some(record) = self.jobs.write().await.get_mut(&id) {
            record.state = JobState::Running;
            record.started_at = Some(Utc::now());
        }
    }

    pub async fn mark_completed(&self, id: Uuid, outcomes: Vec<AnnouncementOutcome>) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(&id) {
            record.state = JobState::Completed;
            record.finished_at = Some(Utc::now());
            record.outcomes = outcomes;
        }
        prune_finished(&mut jobs);
    }

    pub async fn mark_failed(&self, id: Uuid, error: impl Into<String>) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(&id) {
            record.state = JobState::Failed;
            record.finished_at = Some(Utc::now());
            record.error = Some(error.into());
        }
        prune_finished(&mut jobs);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn prune_finished(jobs: &mut HashMap<Uuid, JobRecord>) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .values()
        .filter(|r| r.state.is_finished())
        .map(|r| (r.finished_at.unwrap_or(r.submitted_at), r.id))
        .collect();
    if finished.len() <= MAX_FINISHED_RECORDS {
        return;
    }
    finished.sort();
    let excess = finished.len() - MAX_FINISHED_RECORDS;
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}
