// proceedings-sync/src/catalog/logic.rs
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::AppError;
use crate::sync::filter::to_rule_path;
use crate::utils::ensure_directory;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A relative path collapsed into one file name: `papers/2020/a.pdf` becomes `papers_2020_a.pdf`.
pub fn flattened_name(relative: &Path) -> String {
    to_rule_path(relative).replace('/', "_")
}

/// Every non-directory entry below `dir`, relative to it, in file-name order.
///
/// Symlinked directories are followed. A link back into one of its own ancestors is skipped
/// with a message on stderr; a link that cannot be resolved is listed as an entry.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AppError::Catalog(format!("{} is not an existing directory", dir.display())).into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).follow_links(true).sort_by_file_name() {
        let path = match entry {
            Ok(entry) if entry.file_type().is_dir() => continue,
            Ok(entry) => entry.into_path(),
            Err(e) if e.loop_ancestor().is_some() => {
                if let Some(path) = e.path() {
                    eprintln!("Skipped (symlink loop): {}", path.display());
                }
                continue;
            }
            Err(e) => {
                let dangling = e.path().filter(|p| is_symlink(p)).map(Path::to_path_buf);
                match dangling {
                    Some(path) => path,
                    None => {
                        return Err(e)
                            .with_context(|| format!("Failed to walk directory: {}", dir.display()));
                    }
                }
            }
        };
        let rel = path.strip_prefix(dir).with_context(|| {
            format!(
                "Failed to strip prefix {} from {}",
                dir.display(),
                path.display()
            )
        })?;
        files.push(rel.to_path_buf());
    }
    Ok(files)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Flattened names of all files under each directory, directory by directory.
pub fn list_files(dirs: &[PathBuf]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for dir in dirs {
        names.extend(collect_files(dir)?.iter().map(|rel| flattened_name(rel)));
    }
    Ok(names)
}

/// Creates `link_dir/<flattened name>` symlinks to every file under `src_dir`.
///
/// Existing link names are skipped; other per-file failures are reported and the walk continues.
pub fn link_files(src_dir: &Path, link_dir: &Path) -> Result<LinkSummary> {
    let src_dir = fs::canonicalize(src_dir)
        .map_err(|e| AppError::Catalog(format!("cannot resolve {}: {}", src_dir.display(), e)))?;
    let files = collect_files(&src_dir)?;

    ensure_directory(link_dir)
        .with_context(|| format!("Failed to create link directory {}", link_dir.display()))?;

    let mut summary = LinkSummary::default();
    for rel in files {
        let target = src_dir.join(&rel);
        let link_path = link_dir.join(flattened_name(&rel));

        match create_symlink(&target, &link_path) {
            Ok(()) => summary.created += 1,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                eprintln!("Skipped (already exists): {}", link_path.display());
                summary.skipped += 1;
            }
            Err(e) => {
                eprintln!("Error creating symlink {}: {}", link_path.display(), e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
