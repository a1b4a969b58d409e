//! # Pagekit CLI
//!
//! Edits page-builder projects through the optimistic store, with the HTTP
//! repository as the authority.

mod commands;
mod config;

use std::sync::Arc;

use clap::Parser;
use config::{CliArgs, ClientConfig};
use pagekit_sync::ApiClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pagekit_sync=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    // Use JSON format in production (RUST_LOG_FORMAT=json)
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = ClientConfig::from(&args);
    tracing::debug!(api_url = %config.api_url, project = ?config.project, "configured");

    let client = ApiClient::with_retry_config(&config.api_url, config.token.clone(), config.retry)?;
    let output = commands::run(
        args.command,
        config.project.as_deref(),
        Arc::new(client.elements()),
        &client.projects(),
    )
    .await?;

    println!("{}", output.trim_end());
    Ok(())
}
