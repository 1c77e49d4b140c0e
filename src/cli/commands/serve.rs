//! Web server command.

use std::sync::Arc;

use console::style;

use crate::config::Settings;

const DEFAULT_PORT: u16 = 5000;

/// Start the web server.
pub async fn cmd_serve(settings: Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let bind = parse_bind_address(bind.unwrap_or(&settings.bind));

    println!(
        "{} Starting tenderscrape server at http://{}",
        style("→").cyan(),
        bind
    );
    println!("  Downloads: {}", settings.download_dir.display());
    match settings.webhook_dest.as_deref() {
        Some(dest) => println!("  Webhook:   {}", dest),
        None => println!(
            "  Webhook:   {}",
            style("none (requests must supply webhook_url)").yellow()
        ),
    }
    println!("  Press Ctrl+C to stop");

    crate::server::serve(Arc::new(settings), &bind).await
}

/// Parse a bind address that can be:
/// - Just a port: "5000" -> 0.0.0.0:5000
/// - Just a host: "127.0.0.1" -> 127.0.0.1:5000
/// - Host and port: "127.0.0.1:8080"
fn parse_bind_address(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("0.0.0.0:{}", port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if port_str.parse::<u16>().is_ok() {
            return format!("{}:{}", host, port_str);
        }
    }

    format!("{}:{}", bind, DEFAULT_PORT)
}
