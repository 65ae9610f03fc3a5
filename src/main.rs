//! Proceedings mirror tool
//!
//! Mirrors the PDF proceedings tree from the `work` host into `data/proceedings` under the
//! installation root, best effort. Also lists and flattens local trees.

// proceedings-sync/src/main.rs
mod catalog;
mod config;
mod errors;
mod sync;
mod utils;

use anyhow::{Context, Result};
use config::{AppConfig, OperationConfig, parse_operation};
use std::env;
use std::process::ExitCode;

/// Main entry point for the mirror tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    if let Err(e) = utils::logging::init() {
        eprintln!("⚠️ Failed to initialise logging: {}", e);
    }

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Only the sync and a bare `list` depend on `config.json`.
fn load_app_config() -> Result<AppConfig> {
    let app_config = AppConfig::load().context("Failed to load application configuration")?;
    tracing::debug!(?app_config, "configuration loaded");
    Ok(app_config)
}

async fn run_app() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let operation = parse_operation(&args).context("Invalid command line")?;

    match operation {
        OperationConfig::Sync => {
            let app_config = load_app_config()?;
            println!("⚙️ Starting Proceedings Sync...");
            sync::run_sync_flow(&app_config).await.context("Sync process failed")?;
        }
        OperationConfig::List { dirs } => {
            let dirs = if dirs.is_empty() {
                vec![load_app_config()?.destination()]
            } else {
                dirs
            };
            catalog::run_list_flow(&dirs).context("Listing files failed")?;
        }
        OperationConfig::Link { src_dir, link_dir } => {
            catalog::run_link_flow(&src_dir, &link_dir).context("Linking files failed")?;
        }
    }
    Ok(())
}
