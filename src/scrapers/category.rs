//! Category-code filtering of announcements.
//!
//! Each announcement's classification page shows a label like
//! `"72000000-5. Servizi informatici"`. The two leading characters of the
//! code are checked against a whitelist of accepted prefixes. Anything that
//! prevents reading a code rejects the announcement.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use super::browser::BrowserSession;
use crate::config::Settings;
use crate::models::{Announcement, FilterDecision};

/// Code before the first `". "`, starting with a digit.
static CATEGORY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d\S*?)\.\s").expect("valid category regex"));

/// Extract the code from a `"<code>. <description>"` label.
pub fn parse_category_code(text: &str) -> Option<String> {
    CATEGORY_CODE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First two characters of a code.
pub fn category_prefix(code: &str) -> Option<String> {
    let prefix: String = code.chars().take(2).collect();
    (prefix.chars().count() == 2).then_some(prefix)
}

/// Result of one filter pass.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Accepted announcements, input order preserved.
    pub accepted: Vec<Announcement>,
    /// One decision per input announcement, input order preserved.
    pub decisions: Vec<FilterDecision>,
}

impl FilterOutcome {
    pub fn rejected_count(&self) -> usize {
        self.decisions.len() - self.accepted.len()
    }
}

/// Visits classification pages and applies the prefix whitelist.
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    label_selector: String,
    path_suffix: String,
    wait: Duration,
    whitelist: Vec<String>,
}

impl CategoryFilter {
    pub fn new(settings: &Settings) -> Self {
        Self {
            label_selector: settings.portal.category_label_selector.clone(),
            path_suffix: settings.portal.category_path_suffix.clone(),
            wait: settings.timing.category_wait(),
            whitelist: settings.portal.category_whitelist.clone(),
        }
    }

    pub fn is_whitelisted(&self, prefix: &str) -> bool {
        self.whitelist.iter().any(|p| p == prefix)
    }

    /// Classification page for a documents URL.
    pub fn category_url(&self, documents_url: &str) -> String {
        format!("{}{}", documents_url.trim_end_matches('/'), self.path_suffix)
    }

    /// Decide all announcements sequentially on one session.
    pub async fn filter(
        &self,
        session: &mut dyn BrowserSession,
        announcements: Vec<Announcement>,
    ) -> FilterOutcome {
        let total = announcements.len();
        let mut outcome = FilterOutcome::default();

        for announcement in announcements {
            let decision = self.decide(session, announcement).await;
            if decision.accepted {
                outcome.accepted.push(decision.announcement.clone());
            }
            outcome.decisions.push(decision);
        }

        info!(
            "Category filter accepted {}/{} announcements",
            outcome.accepted.len(),
            total
        );
        outcome
    }

    /// Decide a single announcement.
    pub async fn decide(
        &self,
        session: &mut dyn BrowserSession,
        mut announcement: Announcement,
    ) -> FilterDecision {
        let Some(documents_url) = announcement.documents_url.clone() else {
            warn!("Rejecting {}: no documents URL", announcement.log_label());
            return FilterDecision::rejected(announcement, "no documents URL");
        };
        let url = self.category_url(&documents_url);

        if let Err(e) = session.navigate(&url).await {
            warn!("Rejecting {}: {}", announcement.log_label(), e);
            return FilterDecision::rejected(announcement, e.to_string());
        }

        let label = match session.text_of(&self.label_selector, self.wait).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!(
                    "Rejecting {}: no category label on {}",
                    announcement.log_label(),
                    url
                );
                return FilterDecision::rejected(announcement, "category label not found");
            }
            Err(e) => {
                warn!("Rejecting {}: {}", announcement.log_label(), e);
                return FilterDecision::rejected(announcement, e.to_string());
            }
        };

        let Some(code) = parse_category_code(&label) else {
            warn!(
                "Rejecting {}: unparseable category label {:?}",
                announcement.log_label(),
                label
            );
            return FilterDecision::rejected(announcement, "no category code in label");
        };

        let prefix = category_prefix(&code);
        let accepted = prefix.as_deref().is_some_and(|p| self.is_whitelisted(p));
        debug!(
            "{}: category {} (prefix {:?}) {}",
            announcement.log_label(),
            code,
            prefix,
            if accepted { "accepted" } else { "rejected" }
        );

        if announcement.category_code.is_none() {
            announcement.category_code = Some(code.clone());
        }

        FilterDecision {
            announcement,
            category_code: Some(code),
            category_prefix: prefix,
            accepted,
            reason: None,
        }
    }
}
