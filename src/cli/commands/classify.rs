//! Category filter dry run.

use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::models::Announcement;
use crate::services::Pipeline;

/// Classify announcements by id and print the filter decisions.
pub async fn cmd_classify(settings: Settings, ids: Vec<String>) -> anyhow::Result<()> {
    let base_url = settings.portal.base_url.clone();
    let announcements: Vec<Announcement> = ids
        .into_iter()
        .map(|id| {
            let mut announcement = Announcement {
                id: Some(id),
                ..Default::default()
            };
            announcement.resolve_documents_url(&base_url);
            announcement
        })
        .collect();

    let pipeline = Pipeline::from_settings(Arc::new(settings))?;
    println!(
        "{} Whitelist: {}",
        style("→").cyan(),
        pipeline.settings().portal.category_whitelist.join(", ")
    );

    let outcome = pipeline.classify(announcements).await;

    for decision in &outcome.decisions {
        let status = if decision.accepted {
            style("✓ accepted").green()
        } else {
            style("✗ rejected").red()
        };
        let code = decision.category_code.as_deref().unwrap_or("-");
        println!(
            "  {:<20} {:<12} {}",
            decision.announcement.log_label(),
            code,
            status
        );
        if let Some(reason) = &decision.reason {
            println!("      {}", style(reason).dim());
        }
    }

    println!(
        "\n{} accepted, {} rejected",
        outcome.accepted.len(),
        outcome.rejected_count()
    );
    Ok(())
}
