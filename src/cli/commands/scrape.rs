//! Foreground scrape command.

use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::services::{AnnouncementOutcome, OutcomeStage, Pipeline};

/// Scrape the given documents URLs and dispatch the results, then report.
pub async fn cmd_scrape(
    settings: Settings,
    urls: Vec<String>,
    webhook_url: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (urls, invalid): (Vec<String>, Vec<String>) = urls
        .into_iter()
        .partition(|u| crate::server::schema::is_http_url(u));
    for url in &invalid {
        eprintln!("{} Skipping invalid URL: {}", style("!").yellow(), url);
    }
    if urls.is_empty() {
        anyhow::bail!("no valid http(s) URL given");
    }

    tokio::fs::create_dir_all(&settings.download_dir).await?;
    let pipeline = Pipeline::from_settings(Arc::new(settings))?;

    if !json {
        println!(
            "{} Scraping {} URL{}",
            style("→").cyan(),
            urls.len(),
            if urls.len() == 1 { "" } else { "s" }
        );
    }

    let outcomes = pipeline.run_urls(urls, webhook_url.as_deref()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
    }
    Ok(())
}

fn print_outcome(outcome: &AnnouncementOutcome) {
    let stage = match outcome.stage {
        OutcomeStage::Dispatched => style("✓ dispatched").green(),
        OutcomeStage::NotDispatched => style("○ not dispatched").yellow(),
        OutcomeStage::DispatchFailed => style("✗ dispatch failed").red(),
        OutcomeStage::Rejected => style("✗ rejected").red(),
    };
    println!(
        "  {} {} ({} saved)",
        stage,
        outcome.url,
        outcome.saved
    );
    if let Some(error) = &outcome.error {
        println!("      {}", style(error).dim());
    }
}
