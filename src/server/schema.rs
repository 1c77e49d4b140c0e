//! Inbound request bodies and their validation.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::Announcement;

/// Supported batch schema version.
pub const BATCH_VERSION: u64 = 1;

/// Keys under which direct-link requests carry their attachment links.
const LINK_KEYS: &[&str] = &["documents_links", "link ai documenti dell'annuncio"];

/// One URL, a comma-separated string of URLs, or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UrlList {
    One(String),
    Many(Vec<String>),
}

impl UrlList {
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Self::One(s) => s.split(',').map(str::to_string).collect(),
            Self::Many(v) => v,
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// `POST /scrape`
#[derive(Debug, Default, Deserialize)]
pub struct ScrapeBody {
    pub url: Option<String>,
    pub urls: Option<UrlList>,
    pub webhook_url: Option<String>,
}

impl ScrapeBody {
    /// All given URLs, `url` first, in request order.
    pub fn all_urls(self) -> Vec<String> {
        let mut urls = Vec::new();
        if let Some(url) = self.url {
            urls.extend(UrlList::One(url).into_vec());
        }
        if let Some(list) = self.urls {
            urls.extend(list.into_vec());
        }
        urls
    }
}

/// `POST /delete_file`
#[derive(Debug, Default, Deserialize)]
pub struct DeleteBody {
    pub filename: Option<String>,
    pub filenames: Option<Vec<String>>,
    pub file_url: Option<String>,
    pub file_urls: Option<Vec<String>>,
}

impl DeleteBody {
    pub fn references(self) -> Vec<String> {
        let mut refs = Vec::new();
        refs.extend(self.filenames.unwrap_or_default());
        refs.extend(self.filename);
        refs.extend(self.file_urls.unwrap_or_default());
        refs.extend(self.file_url);
        refs.into_iter().filter(|r| !r.trim().is_empty()).collect()
    }
}

/// A validated `POST /announcements` body.
#[derive(Debug)]
pub struct BatchRequest {
    pub announcements: Vec<Announcement>,
    pub webhook_url: Option<String>,
}

/// Parse a batch body. Only `{version?: 1, announcements: [...], webhook_url?}` is accepted.
pub fn parse_batch(body: Value) -> Result<BatchRequest, String> {
    let Value::Object(mut obj) = body else {
        return Err("body must be a JSON object".to_string());
    };

    if let Some(version) = obj.get("version") {
        match version.as_u64() {
            Some(BATCH_VERSION) => {}
            _ => return Err(format!("unsupported batch version {}", version)),
        }
    }

    let webhook_url = optional_string(&obj, "webhook_url")?;

    let records = match obj.remove("announcements") {
        Some(Value::Array(records)) => records,
        Some(_) => return Err("`announcements` must be a list".to_string()),
        None => return Err("missing `announcements` list".to_string()),
    };

    let mut announcements = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        if !record.is_object() {
            return Err(format!("announcement #{} is not an object", i + 1));
        }
        let announcement: Announcement = serde_json::from_value(record)
            .map_err(|e| format!("announcement #{}: {}", i + 1, e))?;
        let has_id = announcement
            .id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if !has_id && announcement.documents_url.is_none() {
            return Err(format!("announcement #{} has no `id`", i + 1));
        }
        announcements.push(announcement);
    }

    Ok(BatchRequest {
        announcements,
        webhook_url,
    })
}

/// A validated `POST /analyze` body.
#[derive(Debug)]
pub struct AnalyzeRequest {
    pub announcement: Announcement,
    pub links: Vec<String>,
    pub webhook_url: Option<String>,
}

/// Parse a direct-link body: `{announcement: {..., documents_links: str | [str]}, webhook_url?}`.
pub fn parse_analyze(body: Value) -> Result<AnalyzeRequest, String> {
    let Value::Object(mut obj) = body else {
        return Err("body must be a JSON object".to_string());
    };
    let webhook_url = optional_string(&obj, "webhook_url")?;

    let mut record = match obj.remove("announcement") {
        Some(Value::Object(record)) => record,
        Some(_) => return Err("`announcement` must be an object".to_string()),
        None => Map::new(),
    };

    let mut links = Vec::new();
    for key in LINK_KEYS {
        if let Some(value) = record.remove(*key) {
            let list: UrlList = serde_json::from_value(value)
                .map_err(|_| format!("`{}` must be a string or a list of strings", key))?;
            links.extend(list.into_vec());
        }
    }

    let announcement: Announcement = serde_json::from_value(Value::Object(record))
        .map_err(|e| format!("announcement: {}", e))?;

    Ok(AnalyzeRequest {
        announcement,
        links,
        webhook_url,
    })
}

/// Whether `url` is an absolute http(s) URL.
pub fn is_http_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(format!("`{}` must be a string", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_list_forms() {
        let one: UrlList = serde_json::from_value(json!("https://a.test, https://b.test,")).unwrap();
        assert_eq!(one.into_vec(), vec!["https://a.test", "https://b.test"]);
        let many: UrlList = serde_json::from_value(json!(["https://a.test", " "])).unwrap();
        assert_eq!(many.into_vec(), vec!["https://a.test"]);
    }

    #[test]
    fn test_scrape_body_merges_url_and_urls() {
        let body: ScrapeBody = serde_json::from_value(json!({
            "url": "https://a.test",
            "urls": ["https://b.test"],
        }))
        .unwrap();
        assert_eq!(body.all_urls(), vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn test_batch_requires_announcements_key() {
        assert!(parse_batch(json!({"items": [{"id": "1"}]})).is_err());
        assert!(parse_batch(json!([{"id": "1"}])).is_err());
        assert!(parse_batch(json!({"announcements": {"id": "1"}})).is_err());
        assert!(parse_batch(json!({"version": 2, "announcements": []})).is_err());
        assert!(parse_batch(json!({"announcements": [{"title": "no id"}]})).is_err());

        let batch = parse_batch(json!({
            "version": 1,
            "announcements": [{"id": "2024/1", "title": "Servizi"}],
            "webhook_url": "https://hook.test",
        }))
        .unwrap();
        assert_eq!(batch.announcements.len(), 1);
        assert_eq!(batch.webhook_url.as_deref(), Some("https://hook.test"));
    }

    #[test]
    fn test_analyze_accepts_both_link_keys() {
        let req = parse_analyze(json!({
            "announcement": {
                "id": "9",
                "link ai documenti dell'annuncio": "https://p.test/a.pdf",
            }
        }))
        .unwrap();
        assert_eq!(req.links, vec!["https://p.test/a.pdf"]);
        assert_eq!(req.announcement.id.as_deref(), Some("9"));
        assert!(req.announcement.extra.is_empty());

        let req = parse_analyze(json!({
            "announcement": {"documents_links": ["https://p.test/a.pdf", "https://p.test/b.pdf"]}
        }))
        .unwrap();
        assert_eq!(req.links.len(), 2);

        let req = parse_analyze(json!({"announcement": {"id": "1"}})).unwrap();
        assert!(req.links.is_empty());
    }

    #[test]
    fn test_delete_body_references() {
        let body: DeleteBody = serde_json::from_value(json!({
            "filenames": ["a.pdf", ""],
            "file_url": "https://files.test/files/b.pdf",
        }))
        .unwrap();
        assert_eq!(body.references(), vec!["a.pdf", "https://files.test/files/b.pdf"]);
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://portal.test/t/1"));
        assert!(!is_http_url("ftp://portal.test/x"));
        assert!(!is_http_url("not a url"));
    }
}
