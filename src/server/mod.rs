//! HTTP surface for submitting scrape jobs and managing downloaded files.
//!
//! Endpoints only validate and acknowledge; jobs run on the background
//! worker and report to the webhook. Job progress is available under
//! `/jobs/:id`.

mod handlers;
mod routes;
pub mod schema;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::Pipeline;
use crate::work_queue::{JobHandler, JobQueue};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, queue: JobQueue) -> Self {
        Self { settings, queue }
    }
}

/// Start the web server with the production pipeline behind the job queue.
pub async fn serve(settings: Arc<Settings>, bind: &str) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&settings.download_dir).await?;

    let pipeline = Pipeline::from_settings(settings.clone())?;
    let handler: Arc<dyn JobHandler> = Arc::new(pipeline);
    let (queue, _worker) = JobQueue::start(settings.queue_capacity, handler);

    let app = create_router(AppState::new(settings.clone(), queue));

    let addr: SocketAddr = bind.parse()?;
    tracing::info!("Starting server at http://{}", addr);
    tracing::info!("Serving files from {}", settings.download_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
