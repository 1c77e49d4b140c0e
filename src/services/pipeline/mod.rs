//! Per-announcement orchestration.
//!
//! Each announcement moves through
//! `pending -> filtered -> scraped -> post-processed -> uploaded -> dispatched`,
//! ending either dispatched (successfully or not) or rejected by the
//! category filter. Failures stay local to the announcement or attachment
//! they happened in; a run always produces one outcome per input.

mod types;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

pub use types::{AnnouncementOutcome, OutcomeStage, PipelineError, ScrapeRequest};

use crate::config::Settings;
use crate::models::{
    Announcement, AnnouncementPayload, AttachmentResult, FilterDecision, UploadStatus,
};
use crate::scrapers::{AttachmentLocator, CategoryFilter, ChromeLauncher, FilterOutcome, SessionProvider};
use crate::services::download::LinkFetcher;
use crate::services::postprocess::PostProcessor;
use crate::services::upload::{GeminiFileStore, RemoteFileStore};
use crate::services::webhook::WebhookClient;
use crate::utils::{display_label, file_url};

pub struct Pipeline {
    settings: Arc<Settings>,
    sessions: Arc<dyn SessionProvider>,
    locator: AttachmentLocator,
    filter: CategoryFilter,
    postprocess: PostProcessor,
    store: Option<Arc<dyn RemoteFileStore>>,
    fetcher: LinkFetcher,
    webhook: WebhookClient,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        settings: Arc<Settings>,
        sessions: Arc<dyn SessionProvider>,
        postprocess: PostProcessor,
        store: Option<Arc<dyn RemoteFileStore>>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            locator: AttachmentLocator::new(&settings),
            filter: CategoryFilter::new(&settings),
            fetcher: LinkFetcher::new(settings.link_fetch_timeout())?,
            webhook: WebhookClient::new(settings.webhook_timeout())?,
            settings,
            sessions,
            postprocess,
            store,
        })
    }

    /// Production wiring: Chromium, `openssl`/LibreOffice, Gemini when keyed.
    pub fn from_settings(settings: Arc<Settings>) -> Result<Self, PipelineError> {
        let sessions: Arc<dyn SessionProvider> =
            Arc::new(ChromeLauncher::new(settings.browser.clone()));
        let postprocess = PostProcessor::from_settings(&settings.tools);
        let store = GeminiFileStore::from_settings(&settings.gemini)?
            .map(|s| Arc::new(s) as Arc<dyn RemoteFileStore>);
        if store.is_none() {
            info!("GEMINI_API_KEY not set; remote uploads disabled");
        }
        Self::new(settings, sessions, postprocess, store)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn postprocessor(&self) -> &PostProcessor {
        &self.postprocess
    }

    /// Process a request to completion, returning one outcome per announcement.
    pub async fn run(&self, request: ScrapeRequest) -> Vec<AnnouncementOutcome> {
        match request {
            ScrapeRequest::Urls { urls, webhook_url } => {
                self.run_urls(urls, webhook_url.as_deref()).await
            }
            ScrapeRequest::Batch {
                announcements,
                webhook_url,
            } => self.run_batch(announcements, webhook_url.as_deref()).await,
            ScrapeRequest::DirectLinks {
                announcement,
                links,
                webhook_url,
            } => vec![
                self.run_direct_links(announcement, &links, webhook_url.as_deref())
                    .await,
            ],
        }
    }

    /// Scrape bare URLs. No category page is known for them, so nothing is filtered.
    pub async fn run_urls(&self, urls: Vec<String>, webhook_url: Option<&str>) -> Vec<AnnouncementOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let announcement = Announcement::from_url(url.clone());
            outcomes.push(self.process(&announcement, &url, webhook_url).await);
        }
        outcomes
    }

    /// Filter announcement records by category, then scrape the accepted ones.
    pub async fn run_batch(
        &self,
        announcements: Vec<Announcement>,
        webhook_url: Option<&str>,
    ) -> Vec<AnnouncementOutcome> {
        let announcements: Vec<Announcement> = announcements
            .into_iter()
            .map(|mut a| {
                a.resolve_documents_url(&self.settings.portal.base_url);
                a
            })
            .collect();

        let outcome = self.classify(announcements).await;
        let mut outcomes = Vec::with_capacity(outcome.decisions.len());

        for decision in outcome.decisions {
            let label = decision.announcement.log_label().to_string();
            if !decision.accepted {
                debug!("[{}] filtered: rejected", label);
                outcomes.push(AnnouncementOutcome::rejected(
                    &decision.announcement,
                    decision.reason.clone(),
                ));
                continue;
            }
            debug!("[{}] filtered: accepted", label);

            let announcement = decision.announcement;
            // Accepted announcements always have a documents URL.
            let url = announcement.documents_url.clone().unwrap_or_default();
            outcomes.push(self.process(&announcement, &url, webhook_url).await);
        }
        outcomes
    }

    /// Run the category filter on its own session.
    ///
    /// If no browser can be started every announcement is rejected.
    pub async fn classify(&self, announcements: Vec<Announcement>) -> FilterOutcome {
        let mut session = match self.sessions.acquire().await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not start browser for category filter: {}", e);
                let reason = e.to_string();
                let decisions: Vec<FilterDecision> = announcements
                    .into_iter()
                    .map(|a| FilterDecision::rejected(a, reason.clone()))
                    .collect();
                return FilterOutcome {
                    accepted: Vec::new(),
                    decisions,
                };
            }
        };

        let outcome = self.filter.filter(session.as_mut(), announcements).await;
        session.close().await;
        outcome
    }

    /// Download already-known attachment links for one announcement.
    pub async fn run_direct_links(
        &self,
        announcement: Announcement,
        links: &[String],
        webhook_url: Option<&str>,
    ) -> AnnouncementOutcome {
        let label = announcement.log_label().to_string();
        let mut results = Vec::with_capacity(links.len());

        if let Err(e) = tokio::fs::create_dir_all(&self.settings.download_dir).await {
            warn!("Could not create {}: {}", self.settings.download_dir.display(), e);
        }

        for (i, link) in links.iter().enumerate() {
            let mut result = AttachmentResult::new(i + 1, "", link.clone());
            match self.fetcher.fetch(link, &self.settings.download_dir).await {
                Ok(filename) => {
                    result.label = display_label(&filename);
                    result.file_url = Some(file_url(&self.settings.public_base_url, &filename));
                    result.saved_file = Some(filename);
                }
                Err(e) => {
                    warn!("[{}] could not fetch {}: {}", label, link, e);
                    result.note_error(e.to_string());
                }
            }
            results.push(result);
        }
        debug!("[{}] scraped: {} links", label, links.len());

        let url = announcement
            .documents_url
            .clone()
            .or_else(|| links.first().cloned())
            .unwrap_or_default();
        self.finish(&announcement, &url, results, webhook_url).await
    }

    /// Scrape, post-process, upload and dispatch one accepted announcement.
    async fn process(
        &self,
        announcement: &Announcement,
        url: &str,
        webhook_url: Option<&str>,
    ) -> AnnouncementOutcome {
        let results = self.scrape(url).await;
        debug!(
            "[{}] scraped: {} attachment results",
            announcement.log_label(),
            results.len()
        );
        self.finish(announcement, url, results, webhook_url).await
    }

    /// One browser session for one page visit.
    async fn scrape(&self, url: &str) -> Vec<AttachmentResult> {
        let mut session = match self.sessions.acquire().await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not start browser for {}: {}", url, e);
                return vec![AttachmentResult::page_error(e.to_string())];
            }
        };

        let visit = self.locator.visit(session.as_mut(), url).await;
        session.close().await;
        visit.attachments
    }

    async fn finish(
        &self,
        announcement: &Announcement,
        url: &str,
        mut results: Vec<AttachmentResult>,
        webhook_url: Option<&str>,
    ) -> AnnouncementOutcome {
        let label = announcement.log_label().to_string();

        for result in results.iter_mut() {
            self.post_process(result).await;
        }
        debug!("[{}] post-processed", label);

        if let Some(store) = &self.store {
            for result in results.iter_mut() {
                self.upload(store.as_ref(), result).await;
            }
            debug!("[{}] uploaded", label);
        }

        let payload = AnnouncementPayload::new(url, announcement, results);
        let saved = payload.results.iter().filter(|r| r.saved_file.is_some()).count();
        let (stage, error) = self.dispatch(&payload, webhook_url).await;
        debug!("[{}] dispatch: {:?}", label, stage);

        AnnouncementOutcome {
            url: url.to_string(),
            announcement_id: announcement.id.clone(),
            stage,
            saved,
            error,
        }
    }

    /// Replace a saved file with its post-processed artifact.
    async fn post_process(&self, result: &mut AttachmentResult) {
        let Some(saved) = result.saved_file.clone() else {
            return;
        };
        let path = self.settings.download_dir.join(&saved);
        let processed = self.postprocess.process(&path).await;
        if processed == path {
            return;
        }
        if let Some(name) = processed.file_name().map(|n| n.to_string_lossy().into_owned()) {
            result.file_url = Some(file_url(&self.settings.public_base_url, &name));
            result.saved_file = Some(name);
        }
    }

    async fn upload(&self, store: &dyn RemoteFileStore, result: &mut AttachmentResult) {
        let Some(saved) = result.saved_file.clone() else {
            return;
        };
        let path = self.settings.download_dir.join(&saved);
        let display_name = if result.label.is_empty() {
            saved.as_str()
        } else {
            result.label.as_str()
        };

        match store.upload(&path, display_name, None).await {
            Ok(file) => {
                result.gemini_file = Some(file);
                result.gemini_upload = Some(UploadStatus::Uploaded);
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", path_label(&path), e);
                result.gemini_upload = Some(UploadStatus::Failed);
                result.note_error(format!("upload failed: {}", e));
            }
        }
    }

    async fn dispatch(
        &self,
        payload: &AnnouncementPayload,
        webhook_url: Option<&str>,
    ) -> (OutcomeStage, Option<String>) {
        let destination = webhook_url.or(self.settings.webhook_dest.as_deref());
        let Some(destination) = destination else {
            warn!(
                "No webhook destination configured; results for {} not sent",
                payload.url
            );
            return (OutcomeStage::NotDispatched, None);
        };

        match self.webhook.dispatch(destination, payload).await {
            Ok(()) => (OutcomeStage::Dispatched, None),
            Err(e) => {
                error!("Webhook dispatch for {} failed: {}", payload.url, e);
                (OutcomeStage::DispatchFailed, Some(e.to_string()))
            }
        }
    }
}

fn path_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
