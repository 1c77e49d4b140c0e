//! End-to-end pipeline runs against a scripted portal.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use serde_json::json;
use tempfile::tempdir;

use common::{
    files_in, test_settings, BrokenProvider, FakeConverter, FakeItem, FakePortal, FakeProvider,
    FakeVerifier, WebhookSink,
};
use tenderscrape::config::Settings;
use tenderscrape::models::Announcement;
use tenderscrape::scrapers::SessionProvider;
use tenderscrape::services::postprocess::PostProcessor;
use tenderscrape::services::upload::{GeminiFileStore, RemoteFileStore};
use tenderscrape::services::{OutcomeStage, Pipeline, ScrapeRequest};
use tenderscrape::work_queue::{JobQueue, JobState};

const PAGE: &str = "https://portal.test/tenders/2024-1/view/detail/1";

fn fake_tools() -> PostProcessor {
    PostProcessor::new(Arc::new(FakeVerifier), Arc::new(FakeConverter))
}

fn pipeline_with(
    settings: Settings,
    sessions: Arc<dyn SessionProvider>,
    store: Option<Arc<dyn RemoteFileStore>>,
) -> Pipeline {
    Pipeline::new(Arc::new(settings), sessions, fake_tools(), store).unwrap()
}

#[tokio::test]
async fn test_single_pdf_attachment_is_saved_and_dispatched() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let provider = Arc::new(FakeProvider::new(FakePortal::new().with_page(
        PAGE,
        vec![FakeItem::file("doc.pdf", "doc.pdf", b"%PDF-1.4 doc")],
    )));
    let pipeline = pipeline_with(test_settings(dir.path()), provider.clone(), None);

    let outcomes = pipeline
        .run_urls(vec![PAGE.to_string()], Some(&sink.url))
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].stage, OutcomeStage::Dispatched);
    assert_eq!(outcomes[0].saved, 1);

    let payloads = sink.payloads().await;
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload["url"], PAGE);
    assert_eq!(payload["has_attachments"], true);
    assert_eq!(payload["results"][0]["index"], 1);
    assert_eq!(payload["results"][0]["label"], "doc");
    assert_eq!(payload["results"][0]["saved_file"], "doc.pdf");
    assert_eq!(
        payload["results"][0]["file_url"],
        "https://files.test/files/doc.pdf"
    );
    assert!(payload["results"][0].get("gemini_upload").is_none());

    assert_eq!(files_in(dir.path()), vec!["doc.pdf"]);
    // Attempt directories are gone.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(
        provider.portal.acquired.load(Ordering::SeqCst),
        provider.portal.closed.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_signed_envelope_is_replaced_by_payload() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let provider = Arc::new(FakeProvider::new(FakePortal::new().with_page(
        PAGE,
        vec![FakeItem::file(
            "Contratto firmato",
            "contract.p7m",
            b"signed bytes",
        )],
    )));
    let pipeline = pipeline_with(test_settings(dir.path()), provider, None);

    pipeline
        .run_urls(vec![PAGE.to_string()], Some(&sink.url))
        .await;

    let payloads = sink.payloads().await;
    assert_eq!(payloads[0]["results"][0]["saved_file"], "contract");
    assert_eq!(
        payloads[0]["results"][0]["file_url"],
        "https://files.test/files/contract"
    );
    assert_eq!(files_in(dir.path()), vec!["contract"]);
}

#[tokio::test]
async fn test_legacy_doc_is_converted() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let provider = Arc::new(FakeProvider::new(FakePortal::new().with_page(
        PAGE,
        vec![FakeItem::file("Capitolato.doc", "capitolato.doc", b"\xd0\xcf\x11\xe0")],
    )));
    let pipeline = pipeline_with(test_settings(dir.path()), provider, None);

    pipeline
        .run_urls(vec![PAGE.to_string()], Some(&sink.url))
        .await;

    let payloads = sink.payloads().await;
    assert_eq!(payloads[0]["results"][0]["label"], "Capitolato");
    assert_eq!(payloads[0]["results"][0]["saved_file"], "capitolato.pdf");
    assert_eq!(files_in(dir.path()), vec!["capitolato.pdf"]);
}

#[tokio::test]
async fn test_batch_dispatches_only_whitelisted_announcements() {
    let dir = tempdir().unwrap();
    let mut server = mockito::Server::new_async().await;
    let hook = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJson(json!({
            "has_attachments": true,
            "source": "tenderscrape",
        })))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let url = |id: &str| format!("https://portal.test/tenders/{}/view/detail/1", id);
    let portal = FakePortal::new()
        .with_label(&format!("{}/categories", url("A1")), "72000000-5. Servizi IT")
        .with_label(&format!("{}/categories", url("A2")), "45000000-7. Lavori edili")
        .with_label(&format!("{}/categories", url("A3")), "48000000-8. Software")
        .with_page(&url("A1"), vec![FakeItem::file("Bando", "bando.pdf", b"a")])
        .with_page(&url("A2"), vec![FakeItem::file("Bando", "bando.pdf", b"b")])
        .with_page(&url("A3"), vec![FakeItem::file("Bando", "bando.pdf", b"c")]);
    let pipeline = pipeline_with(
        test_settings(dir.path()),
        Arc::new(FakeProvider::new(portal)),
        None,
    );

    let announcements = ["A1", "A2", "A3"]
        .iter()
        .map(|id| Announcement {
            id: Some(id.to_string()),
            ..Default::default()
        })
        .collect();
    let outcomes = pipeline
        .run_batch(announcements, Some(&format!("{}/hook", server.url())))
        .await;

    let stages: Vec<OutcomeStage> = outcomes.iter().map(|o| o.stage).collect();
    assert_eq!(
        stages,
        vec![
            OutcomeStage::Dispatched,
            OutcomeStage::Rejected,
            OutcomeStage::Dispatched
        ]
    );
    hook.assert_async().await;
    // The second accepted download must not overwrite the first.
    assert_eq!(files_in(dir.path()), vec!["bando (1).pdf", "bando.pdf"]);
}

#[tokio::test]
async fn test_batch_payload_carries_category_from_portal() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let portal = FakePortal::new()
        .with_label(&format!("{}/categories", PAGE), "72000000-5. Servizi IT")
        .with_page(PAGE, vec![FakeItem::file("Bando", "bando.pdf", b"a")]);
    let pipeline = pipeline_with(
        test_settings(dir.path()),
        Arc::new(FakeProvider::new(portal)),
        None,
    );

    let outcomes = pipeline
        .run_batch(
            vec![Announcement {
                id: Some("2024-1".to_string()),
                ..Default::default()
            }],
            Some(&sink.url),
        )
        .await;

    assert_eq!(outcomes[0].stage, OutcomeStage::Dispatched);
    let payloads = sink.payloads().await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["announcement"]["category_code"], "72000000-5");
}

#[tokio::test]
async fn test_batch_rejects_everything_when_browser_fails() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let pipeline = pipeline_with(test_settings(dir.path()), Arc::new(BrokenProvider), None);

    let outcomes = pipeline
        .run_batch(
            vec![Announcement {
                id: Some("2024/9".to_string()),
                ..Default::default()
            }],
            Some(&sink.url),
        )
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].stage, OutcomeStage::Rejected);
    assert!(outcomes[0].error.as_deref().unwrap().contains("no display"));
    assert!(sink.payloads().await.is_empty());
}

#[tokio::test]
async fn test_page_error_is_still_dispatched() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let pipeline = pipeline_with(
        test_settings(dir.path()),
        Arc::new(FakeProvider::new(FakePortal::new())),
        None,
    );

    let outcomes = pipeline
        .run_urls(vec!["https://portal.test/missing".to_string()], Some(&sink.url))
        .await;

    assert_eq!(outcomes[0].stage, OutcomeStage::Dispatched);
    let payloads = sink.payloads().await;
    assert_eq!(payloads[0]["has_attachments"], false);
    assert_eq!(payloads[0]["results"].as_array().unwrap().len(), 1);
    assert!(payloads[0]["results"][0]["error"]
        .as_str()
        .unwrap()
        .contains("navigation"));
}

#[tokio::test]
async fn test_without_destination_nothing_is_sent() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::new(
        FakePortal::new().with_page(PAGE, vec![FakeItem::file("doc", "doc.pdf", b"x")]),
    ));
    let pipeline = pipeline_with(test_settings(dir.path()), provider, None);

    let outcomes = pipeline.run_urls(vec![PAGE.to_string()], None).await;

    assert_eq!(outcomes[0].stage, OutcomeStage::NotDispatched);
    assert_eq!(outcomes[0].saved, 1);
    assert_eq!(files_in(dir.path()), vec!["doc.pdf"]);
}

#[tokio::test]
async fn test_unreachable_webhook_is_recorded() {
    let dir = tempdir().unwrap();
    let mut server = mockito::Server::new_async().await;
    let hook = server
        .mock("POST", "/hook")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;
    let provider = Arc::new(FakeProvider::new(
        FakePortal::new().with_page(PAGE, vec![FakeItem::file("doc", "doc.pdf", b"x")]),
    ));
    let pipeline = pipeline_with(test_settings(dir.path()), provider, None);

    let outcomes = pipeline
        .run_urls(vec![PAGE.to_string()], Some(&format!("{}/hook", server.url())))
        .await;

    assert_eq!(outcomes[0].stage, OutcomeStage::DispatchFailed);
    assert!(outcomes[0].error.is_some());
    hook.assert_async().await;
}

#[tokio::test]
async fn test_successful_upload_is_reported() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let mut gemini = mockito::Server::new_async().await;
    let upload = gemini
        .mock("POST", "/upload")
        .match_header("x-goog-api-key", "test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "file": {
                    "name": "files/abc123",
                    "uri": "https://generativelanguage.test/v1beta/files/abc123",
                    "mimeType": "application/pdf",
                    "state": "ACTIVE"
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let store = GeminiFileStore::new(
        "test-key",
        format!("{}/upload", gemini.url()),
        Duration::from_secs(5),
    )
    .unwrap();

    let provider = Arc::new(FakeProvider::new(
        FakePortal::new().with_page(PAGE, vec![FakeItem::file("doc.pdf", "doc.pdf", b"%PDF")]),
    ));
    let pipeline = pipeline_with(test_settings(dir.path()), provider, Some(Arc::new(store)));

    pipeline
        .run_urls(vec![PAGE.to_string()], Some(&sink.url))
        .await;

    upload.assert_async().await;
    let payloads = sink.payloads().await;
    let result = &payloads[0]["results"][0];
    assert_eq!(result["gemini_upload"], "uploaded");
    assert_eq!(result["gemini_file"]["name"], "files/abc123");
    assert!(result.get("error").is_none());
}

#[tokio::test]
async fn test_failed_upload_is_marked_failed() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let mut gemini = mockito::Server::new_async().await;
    gemini
        .mock("POST", "/upload")
        .with_status(500)
        .with_body("internal")
        .create_async()
        .await;
    let store = GeminiFileStore::new(
        "test-key",
        format!("{}/upload", gemini.url()),
        Duration::from_secs(5),
    )
    .unwrap();

    let provider = Arc::new(FakeProvider::new(
        FakePortal::new().with_page(PAGE, vec![FakeItem::file("doc.pdf", "doc.pdf", b"%PDF")]),
    ));
    let pipeline = pipeline_with(test_settings(dir.path()), provider, Some(Arc::new(store)));

    let outcomes = pipeline
        .run_urls(vec![PAGE.to_string()], Some(&sink.url))
        .await;

    assert_eq!(outcomes[0].stage, OutcomeStage::Dispatched);
    let payloads = sink.payloads().await;
    let result = &payloads[0]["results"][0];
    assert_eq!(result["gemini_upload"], "failed");
    assert_eq!(result["saved_file"], "doc.pdf");
    assert!(result["error"]
        .as_str()
        .unwrap()
        .starts_with("upload failed"));
}

#[tokio::test]
async fn test_direct_links_are_fetched_without_browser() {
    let dir = tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let mut files = mockito::Server::new_async().await;
    files
        .mock("GET", "/docs/Bando%20gara.pdf")
        .with_status(200)
        .with_body("%PDF-1.4 bando")
        .create_async()
        .await;
    files
        .mock("GET", "/docs/missing.pdf")
        .with_status(404)
        .create_async()
        .await;

    let pipeline = pipeline_with(test_settings(dir.path()), Arc::new(BrokenProvider), None);
    let announcement = Announcement {
        id: Some("2024/5".to_string()),
        title: Some("Fornitura server".to_string()),
        ..Default::default()
    };
    let links = vec![
        format!("{}/docs/Bando%20gara.pdf", files.url()),
        format!("{}/docs/missing.pdf", files.url()),
    ];

    let outcome = pipeline
        .run_direct_links(announcement, &links, Some(&sink.url))
        .await;

    assert_eq!(outcome.stage, OutcomeStage::Dispatched);
    assert_eq!(outcome.saved, 1);

    let payloads = sink.payloads().await;
    let payload = &payloads[0];
    assert_eq!(payload["url"], links[0].as_str());
    assert_eq!(payload["announcement"]["title"], "Fornitura server");
    assert_eq!(payload["results"][0]["saved_file"], "Bando gara.pdf");
    assert_eq!(payload["results"][0]["label"], "Bando gara");
    assert!(payload["results"][1]["error"].is_string());
    assert_eq!(files_in(dir.path()), vec!["Bando gara.pdf"]);
}

#[tokio::test]
async fn test_queued_job_completes_with_outcomes() {
    let dir = tempdir().unwrap();
    let provider = Arc::new(FakeProvider::new(
        FakePortal::new().with_page(PAGE, vec![FakeItem::file("doc", "doc.pdf", b"x")]),
    ));
    let pipeline = pipeline_with(test_settings(dir.path()), provider, None);
    let (queue, _worker) = JobQueue::start(4, Arc::new(pipeline));

    let record = queue
        .submit(ScrapeRequest::Urls {
            urls: vec![PAGE.to_string()],
            webhook_url: None,
        })
        .await
        .unwrap();

    let mut finished = None;
    for _ in 0..200 {
        let current = queue.registry().get(record.id).await.unwrap();
        if current.state.is_finished() {
            finished = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let finished = finished.expect("job did not finish");
    assert_eq!(finished.state, JobState::Completed);
    assert_eq!(finished.outcomes.len(), 1);
    assert_eq!(finished.outcomes[0].saved, 1);
}
