// proceedings-sync/src/sync/command.rs
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::SyncConfig;

/// A fully assembled mirror invocation: program plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl MirrorCommand {
    /// Archive, verbose and progress are always on; compression, error skipping and the
    /// filter rules come from the config. Source then destination close the list.
    pub fn build(program: &Path, sync_config: &SyncConfig, destination: &Path) -> Self {
        let mut args: Vec<OsString> = Vec::new();
        args.push(if sync_config.compress { "-avz" } else { "-av" }.into());
        args.push("--progress".into());
        args.extend(sync_config.filter_rules.to_args().into_iter().map(OsString::from));
        if sync_config.ignore_errors {
            args.push("--ignore-errors".into());
        }
        args.push(sync_config.remote_source.clone().into());
        args.push(destination.as_os_str().to_os_string());

        MirrorCommand {
            program: program.to_path_buf(),
            args,
        }
    }

    #[cfg(test)]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[cfg(test)]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn to_tokio_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Renders the command the way an operator would paste it into a shell.
impl fmt::Display for MirrorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:@,+%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;

    #[test]
    fn test_default_command_argument_order() -> anyhow::Result<()> {
        let config = SyncConfig::proceedings()?;
        let cmd = MirrorCommand::build(
            Path::new("/usr/bin/rsync"),
            &config,
            Path::new("/srv/app/data/proceedings"),
        );

        let args: Vec<String> = cmd
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-avz",
                "--progress",
                "--include=*/",
                "--include=*.pdf",
                "--exclude=*",
                "--prune-empty-dirs",
                "--ignore-errors",
                "work:/home/proceedings/",
                "/srv/app/data/proceedings",
            ]
        );
        assert_eq!(cmd.program(), Path::new("/usr/bin/rsync"));
        Ok(())
    }

    #[test]
    fn test_optional_flags_follow_config() -> anyhow::Result<()> {
        let mut config = SyncConfig::proceedings()?;
        config.compress = false;
        config.ignore_errors = false;
        let cmd = MirrorCommand::build(Path::new("rsync"), &config, Path::new("out"));

        assert_eq!(cmd.args()[0], OsString::from("-av"));
        assert!(!cmd.args().iter().any(|a| a == "--ignore-errors"));
        Ok(())
    }

    #[test]
    fn test_echo_quotes_glob_arguments() -> anyhow::Result<()> {
        let config = SyncConfig::proceedings()?;
        let cmd = MirrorCommand::build(Path::new("rsync"), &config, Path::new("/tmp/my docs"));

        assert_eq!(
            cmd.to_string(),
            "rsync -avz --progress '--include=*/' '--include=*.pdf' '--exclude=*' \
             --prune-empty-dirs --ignore-errors work:/home/proceedings/ '/tmp/my docs'"
        );
        Ok(())
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("plain"), "plain");
    }
}
