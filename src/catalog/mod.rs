// proceedings-sync/src/catalog/mod.rs
pub(crate) mod logic;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Prints the flattened name of every file under the given directories.
pub fn run_list_flow(dirs: &[PathBuf]) -> Result<()> {
    for name in logic::list_files(dirs)? {
        println!("{}", name);
    }
    Ok(())
}

/// Builds a flat directory of symlinks, one per file under `src_dir`.
pub fn run_link_flow(src_dir: &Path, link_dir: &Path) -> Result<()> {
    println!("🔗 Linking files from {} into {}", src_dir.display(), link_dir.display());
    let summary = logic::link_files(src_dir, link_dir)?;
    println!(
        "✓ {} link(s) created, {} skipped, {} failed.",
        summary.created, summary.skipped, summary.failed
    );
    Ok(())
}
