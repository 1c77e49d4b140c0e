//! Tool availability check.

use console::style;

use crate::config::Settings;
use crate::scrapers::browser::find_chrome;
use crate::services::PostProcessor;

/// Report which external tools the pipeline can use.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("Tool Status").bold());
    println!("{}", "-".repeat(50));

    let mut all_found = true;

    println!("\n{}", style("Browser:").cyan());
    if let Some(remote) = settings.browser.remote_url.as_deref() {
        println!("  {:<15} {}", "remote", style(format!("→ {}", remote)).green());
    } else {
        match find_chrome(settings.browser.chrome_bin.as_deref()) {
            Ok(path) => println!(
                "  {:<15} {} {}",
                "chrome",
                style("✓ found").green(),
                style(path.display()).dim()
            ),
            Err(e) => {
                all_found = false;
                println!("  {:<15} {}", "chrome", style("✗ not found").red());
                println!("                  {}", style(e).dim());
            }
        }
        if !cfg!(feature = "browser") {
            all_found = false;
            println!(
                "  {:<15} {}",
                "",
                style("built without the `browser` feature").yellow()
            );
        }
    }

    println!("\n{}", style("Document Tools:").cyan());
    let postprocess = PostProcessor::from_settings(&settings.tools);
    let tools = [
        (
            settings.tools.openssl_bin.display().to_string(),
            postprocess.verifier().is_available(),
            ".p7m envelopes are kept as-is",
        ),
        (
            settings.tools.soffice_bin.display().to_string(),
            postprocess.converter().is_available(),
            ".doc files are kept as-is",
        ),
    ];
    for (tool, available, consequence) in &tools {
        if *available {
            println!("  {:<15} {}", tool, style("✓ found").green());
        } else {
            all_found = false;
            println!("  {:<15} {}", tool, style("✗ not found").red());
            println!("                  {}", style(consequence).dim());
        }
    }

    println!("\n{}", style("Services:").cyan());
    let upload = if settings.upload_enabled() {
        style("✓ enabled").green()
    } else {
        style("○ disabled (GEMINI_API_KEY not set)").yellow()
    };
    println!("  {:<15} {}", "gemini", upload);
    let webhook = match settings.webhook_dest.as_deref() {
        Some(dest) => style(format!("✓ {}", dest)).green(),
        None => style("○ per-request only".to_string()).yellow(),
    };
    println!("  {:<15} {}", "webhook", webhook);

    println!();
    if all_found {
        println!("{} All tools available", style("✓").green());
    } else {
        println!(
            "{} Some tools are missing; affected stages will be skipped",
            style("!").yellow()
        );
    }
    Ok(())
}
