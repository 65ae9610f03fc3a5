// proceedings-sync/src/sync/mod.rs
pub(crate) mod command;
pub(crate) mod filter;
pub(crate) mod logic;

use anyhow::Result;
use crate::config::AppConfig;

/// Public entry point for the sync process.
///
/// Returns an error only when the destination directory cannot be prepared; whatever the mirror
/// tool does is reported here and otherwise ignored.
pub async fn run_sync_flow(app_config: &AppConfig) -> Result<logic::SyncReport> {
    let report = logic::perform_sync_orchestration(app_config).await?;

    if report.outcome.is_completed() {
        println!("✓ Mirror {}.", report.outcome);
    } else {
        println!("⚠️ Mirror {} (ignored).", report.outcome);
    }
    println!(
        "📄 {} retained file(s) in {} director(ies) under {} ({} not matching the filter rules), started {}, took {:.1}s",
        report.summary.retained_files,
        report.summary.retained_directories,
        report.destination.display(),
        report.summary.stray_files,
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.elapsed.as_secs_f64()
    );

    Ok(report)
}
