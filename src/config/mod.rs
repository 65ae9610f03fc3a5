// proceedings-sync/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::errors::AppError;
use crate::sync::filter::{DEFAULT_FILTER_RULES, FilterRuleSet};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_REMOTE_SOURCE: &str = "work:/home/proceedings/";
pub const DEFAULT_DESTINATION_SUBDIR: &str = "data/proceedings";
pub const DEFAULT_MIRROR_TOOL: &str = "rsync";

pub const ROOT_ENV_VAR: &str = "PROCEEDINGS_SYNC_ROOT";
pub const REMOTE_ENV_VAR: &str = "PROCEEDINGS_REMOTE";

// Structs for deserializing config.json. Every field is optional; absent fields keep the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJsonConfig {
    pub remote_source: Option<String>,
    pub destination_subdir: Option<PathBuf>,
    pub mirror_tool: Option<String>,
    pub filter_rules: Option<Vec<String>>,
    pub prune_empty_dirs: Option<bool>,
    pub ignore_errors: Option<bool>,
    pub compress: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub remote_source: String,
    pub destination_subdir: PathBuf,
    pub mirror_tool: String,
    pub filter_rules: FilterRuleSet,
    pub ignore_errors: bool,
    pub compress: bool,
}

impl SyncConfig {
    /// The fixed mirror: PDFs from `work:/home/proceedings/` into `data/proceedings`.
    pub fn proceedings() -> Result<Self, AppError> {
        Ok(SyncConfig {
            remote_source: DEFAULT_REMOTE_SOURCE.to_string(),
            destination_subdir: PathBuf::from(DEFAULT_DESTINATION_SUBDIR),
            mirror_tool: DEFAULT_MIRROR_TOOL.to_string(),
            filter_rules: FilterRuleSet::proceedings()?,
            ignore_errors: true,
            compress: true,
        })
    }

    pub fn destination(&self, installation_root: &Path) -> PathBuf {
        installation_root.join(&self.destination_subdir)
    }
}

/// The operation selected by the first command-line argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationConfig {
    Sync,
    /// No directories means the proceedings destination.
    List { dirs: Vec<PathBuf> },
    Link { src_dir: PathBuf, link_dir: PathBuf },
}

/// `args` excludes the program name. No arguments selects the sync.
pub fn parse_operation(args: &[String]) -> Result<OperationConfig, AppError> {
    let Some((choice, rest)) = args.split_first() else {
        return Ok(OperationConfig::Sync);
    };

    match choice.trim() {
        "sync" if rest.is_empty() => Ok(OperationConfig::Sync),
        "sync" => Err(AppError::InvalidInput("'sync' takes no arguments".into())),
        "list" => Ok(OperationConfig::List {
            dirs: rest.iter().map(PathBuf::from).collect(),
        }),
        "link" => match rest {
            [src_dir, link_dir] => Ok(OperationConfig::Link {
                src_dir: PathBuf::from(src_dir),
                link_dir: PathBuf::from(link_dir),
            }),
            _ => Err(AppError::InvalidInput("usage: link SRC_DIR LINK_DIR".into())),
        },
        other => Err(AppError::InvalidInput(format!(
            "unknown operation '{}'; expected 'sync', 'list' or 'link'",
            other
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub installation_root: PathBuf,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Resolves the installation root, then layers `config.json` (if present) and the
    /// remote-source environment override on top of the defaults.
    pub fn load() -> Result<Self> {
        let root_override = env::var_os(ROOT_ENV_VAR).map(PathBuf::from);
        let installation_root = resolve_installation_root(root_override)?;
        let remote_override = env::var(REMOTE_ENV_VAR).ok().filter(|s| !s.trim().is_empty());
        Self::load_from_root(&installation_root, remote_override)
    }

    pub fn load_from_root(installation_root: &Path, remote_override: Option<String>) -> Result<Self> {
        let config_path = installation_root.join(CONFIG_FILE_NAME);
        let raw_json_config = if config_path.is_file() {
            RawJsonConfig::load_from_json(&config_path)?
        } else {
            RawJsonConfig::default()
        };

        let mut sync = load_sync_config_from_json(&raw_json_config)
            .with_context(|| format!("Invalid sync configuration in {}", config_path.display()))?;
        if let Some(remote) = remote_override {
            sync.remote_source = remote;
        }

        Ok(AppConfig {
            installation_root: installation_root.to_path_buf(),
            sync,
        })
    }

    pub fn destination(&self) -> PathBuf {
        self.sync.destination(&self.installation_root)
    }
}

impl RawJsonConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw: RawJsonConfig = serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })?;
        Ok(raw)
    }
}

/// Explicit override if given, otherwise the current working directory. Relative overrides are
/// taken relative to the working directory.
pub fn resolve_installation_root(root_override: Option<PathBuf>) -> Result<PathBuf> {
    let cwd = env::current_dir().context("Failed to determine the current working directory")?;
    Ok(match root_override {
        Some(root) if root.as_os_str().is_empty() => cwd,
        Some(root) if root.is_absolute() => root,
        Some(root) => cwd.join(root),
        None => cwd,
    })
}

pub fn load_sync_config_from_json(raw_config: &RawJsonConfig) -> Result<SyncConfig> {
    let mut sync = SyncConfig::proceedings()?;

    if let Some(remote) = &raw_config.remote_source {
        if remote.trim().is_empty() {
            return Err(AppError::Config("remote_source cannot be empty in config.json.".into()).into());
        }
        sync.remote_source = remote.clone();
    }

    if let Some(subdir) = &raw_config.destination_subdir {
        validate_destination_subdir(subdir)?;
        sync.destination_subdir = subdir.clone();
    }

    if let Some(tool) = &raw_config.mirror_tool {
        if tool.trim().is_empty() {
            return Err(AppError::Config("mirror_tool cannot be empty in config.json.".into()).into());
        }
        sync.mirror_tool = tool.clone();
    }

    let prune = raw_config.prune_empty_dirs.unwrap_or(true);
    sync.filter_rules = match &raw_config.filter_rules {
        Some(rules) if rules.is_empty() => {
            return Err(AppError::Config("filter_rules cannot be an empty list in config.json.".into()).into());
        }
        Some(rules) => FilterRuleSet::parse(rules, prune)?,
        None => FilterRuleSet::parse(DEFAULT_FILTER_RULES, prune)?,
    };

    if let Some(ignore_errors) = raw_config.ignore_errors {
        sync.ignore_errors = ignore_errors;
    }
    if let Some(compress) = raw_config.compress {
        sync.compress = compress;
    }

    Ok(sync)
}

/// The destination must stay inside the installation root.
fn validate_destination_subdir(subdir: &Path) -> Result<(), AppError> {
    if subdir.as_os_str().is_empty() {
        return Err(AppError::Config("destination_subdir cannot be empty in config.json.".into()));
    }
    let escapes = subdir.components().any(|c| {
        matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        return Err(AppError::Config(format!(
            "destination_subdir must be a relative path inside the installation root, got {}",
            subdir.display()
        )));
    }
    Ok(())
}
