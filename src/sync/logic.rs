// proceedings-sync/src/sync/logic.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::command::MirrorCommand;
use super::filter::FilterRuleSet;
use crate::config::{AppConfig, SyncConfig};
use crate::utils::{ensure_directory, find_executable};

/// rsync: "Partial transfer due to error".
const RSYNC_PARTIAL_TRANSFER: i32 = 23;
/// rsync: "Partial transfer due to vanished source files".
const RSYNC_VANISHED_SOURCE: i32 = 24;

/// How the mirror tool run ended. Never turned into an error of the invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Completed,
    Partial { code: i32 },
    Failed { code: i32 },
    Terminated,
    Unavailable { reason: String },
}

impl MirrorOutcome {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => MirrorOutcome::Completed,
            Some(code @ (RSYNC_PARTIAL_TRANSFER | RSYNC_VANISHED_SOURCE)) => {
                MirrorOutcome::Partial { code }
            }
            Some(code) => MirrorOutcome::Failed { code },
            None => MirrorOutcome::Terminated,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self::from_code(status.code())
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, MirrorOutcome::Completed)
    }
}

impl fmt::Display for MirrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorOutcome::Completed => write!(f, "completed"),
            MirrorOutcome::Partial { code } => {
                write!(f, "partial transfer (exit code {}), some files were skipped", code)
            }
            MirrorOutcome::Failed { code } => write!(f, "failed (exit code {})", code),
            MirrorOutcome::Terminated => write!(f, "terminated by signal"),
            MirrorOutcome::Unavailable { reason } => write!(f, "mirror tool unavailable: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub destination: PathBuf,
    pub outcome: MirrorOutcome,
    pub summary: DestinationSummary,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

/// What the destination holds after a run, judged by the filter rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestinationSummary {
    /// Files the filter rules would transfer.
    pub retained_files: usize,
    /// Directories that hold those files (all entered directories when pruning is off).
    pub retained_directories: usize,
    /// Files the filter rules would not transfer.
    pub stray_files: usize,
}

/// Runs one best-effort mirror into the destination under the installation root.
///
/// 1. Ensures the destination directory exists. This is the only step whose failure is returned.
/// 2. Locates the mirror tool and builds its argument list.
/// 3. Prints the command, then runs it with inherited stdout/stderr so progress streams live.
/// 4. Classifies the exit status and summarizes the destination. Neither affects the result.
pub async fn perform_sync_orchestration(app_config: &AppConfig) -> Result<SyncReport> {
    let sync_config = &app_config.sync;
    let destination = app_config.destination();

    println!("📂 Destination directory: {}", destination.display());
    ensure_directory(&destination).with_context(|| {
        format!(
            "Failed to prepare destination directory {}",
            destination.display()
        )
    })?;

    let started_at = Local::now();
    let clock = Instant::now();
    let outcome = run_mirror(sync_config, &destination).await;
    let elapsed = clock.elapsed();

    let elapsed_ms = elapsed.as_millis() as u64;
    match &outcome {
        MirrorOutcome::Completed => info!(elapsed_ms, "mirror completed"),
        other => warn!(outcome = %other, elapsed_ms, "mirror did not complete cleanly; continuing"),
    }

    let summary = match summarize_destination(&destination, &sync_config.filter_rules) {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = ?e, "could not summarize destination");
            DestinationSummary::default()
        }
    };

    Ok(SyncReport {
        destination,
        outcome,
        summary,
        started_at,
        elapsed,
    })
}

async fn run_mirror(sync_config: &SyncConfig, destination: &Path) -> MirrorOutcome {
    let located = find_executable(&sync_config.mirror_tool);
    let program = match &located {
        Ok(path) => path.clone(),
        Err(_) => PathBuf::from(&sync_config.mirror_tool),
    };
    let command = MirrorCommand::build(&program, sync_config, destination);

    let rules = &sync_config.filter_rules;
    let listed: Vec<String> = rules.rules().iter().map(|r| r.to_string()).collect();
    println!(
        "🔎 Filter rules: {}{}",
        listed.join(", "),
        if rules.prune_empty_dirs() { " (empty directories pruned)" } else { "" }
    );
    println!("+ {}", command);
    info!(command = %command, "running mirror");

    if let Err(e) = located {
        eprintln!("⚠️ {:#}", e);
        return MirrorOutcome::Unavailable {
            reason: format!("{:#}", e),
        };
    }

    match command.to_tokio_command().status().await {
        Ok(status) => {
            debug!(%status, "mirror exited");
            MirrorOutcome::from_status(status)
        }
        Err(e) => MirrorOutcome::Unavailable {
            reason: format!("failed to spawn {}: {}", program.display(), e),
        },
    }
}

/// Counts destination files the rules retain against those they would not have transferred.
pub fn summarize_destination(
    destination: &Path,
    rules: &FilterRuleSet,
) -> Result<DestinationSummary> {
    let plan = rules.plan(destination)?;
    let retained = plan.files.len();

    let mut total = 0usize;
    for entry in WalkDir::new(destination).min_depth(1) {
        let entry = entry
            .with_context(|| format!("Failed to walk directory: {}", destination.display()))?;
        if !entry.file_type().is_dir() {
            total += 1;
        }
    }

    Ok(DestinationSummary {
        retained_files: retained,
        retained_directories: plan.directories.len(),
        stray_files: total.saturating_sub(retained),
    })
}
