// proceedings-sync/src/sync/filter.rs
//! Ordered include/exclude rules for the mirror.
//!
//! Rules are handed to rsync verbatim (`--include=`/`--exclude=`) and are also evaluated
//! locally so the destination can be checked against what the mirror is allowed to bring in.
//! Local evaluation follows rsync's rule semantics: the first matching rule decides, a path no
//! rule matches is included, and an excluded directory is never descended into.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

use crate::errors::AppError;

/// Rules mirroring only PDFs: every directory is entered, `*.pdf` kept, everything else dropped.
pub const DEFAULT_FILTER_RULES: &[&str] = &["+ */", "+ *.pdf", "- *"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Include,
    Exclude,
}

#[derive(Debug, Clone)]
pub struct FilterRule {
    action: FilterAction,
    pattern: String,
    dir_only: bool,
    full_path: bool,
    matcher: Regex,
}

impl FilterRule {
    pub fn new(action: FilterAction, pattern: &str) -> Result<Self, AppError> {
        let invalid = |reason: &str| AppError::InvalidFilterRule {
            rule: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let dir_only = pattern.ends_with('/');
        let body = pattern.trim_end_matches('/');
        let anchored = body.starts_with('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return Err(invalid("pattern matches nothing once slashes are removed"));
        }

        let full_path = body.contains('/') || body.contains("**");
        let translated = glob_to_regex(body).map_err(|reason| invalid(&reason))?;
        let source = if anchored || !full_path {
            format!("^{}$", translated)
        } else {
            format!("^(?:.*/)?{}$", translated)
        };
        let matcher = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;

        Ok(FilterRule {
            action,
            pattern: pattern.to_string(),
            dir_only,
            full_path: full_path || anchored,
            matcher,
        })
    }

    pub fn action(&self) -> FilterAction {
        self.action
    }

    /// `relative` uses `/` separators and is relative to the transfer root.
    pub fn matches(&self, relative: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.full_path {
            self.matcher.is_match(relative)
        } else {
            let name = relative.rsplit('/').next().unwrap_or(relative);
            self.matcher.is_match(name)
        }
    }

    /// The rsync flag carrying this rule.
    pub fn to_arg(&self) -> String {
        match self.action {
            FilterAction::Include => format!("--include={}", self.pattern),
            FilterAction::Exclude => format!("--exclude={}", self.pattern),
        }
    }
}

impl FromStr for FilterRule {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (action, pattern) = if let Some(rest) = trimmed.strip_prefix("+ ") {
            (FilterAction::Include, rest)
        } else if let Some(rest) = trimmed.strip_prefix("- ") {
            (FilterAction::Exclude, rest)
        } else {
            return Err(AppError::InvalidFilterRule {
                rule: s.to_string(),
                reason: "expected '+ PATTERN' or '- PATTERN'".to_string(),
            });
        };
        FilterRule::new(action, pattern.trim_start())
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.action {
            FilterAction::Include => '+',
            FilterAction::Exclude => '-',
        };
        write!(f, "{} {}", sign, self.pattern)
    }
}

/// What a mirror of a local tree would create under the destination.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FilterRuleSet {
    rules: Vec<FilterRule>,
    prune_empty_dirs: bool,
}

impl FilterRuleSet {
    pub fn new(rules: Vec<FilterRule>, prune_empty_dirs: bool) -> Self {
        FilterRuleSet { rules, prune_empty_dirs }
    }

    pub fn parse<S: AsRef<str>>(rules: &[S], prune_empty_dirs: bool) -> Result<Self, AppError> {
        let rules = rules
            .iter()
            .map(|r| r.as_ref().parse::<FilterRule>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules, prune_empty_dirs))
    }

    pub fn proceedings() -> Result<Self, AppError> {
        Self::parse(DEFAULT_FILTER_RULES, true)
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn prune_empty_dirs(&self) -> bool {
        self.prune_empty_dirs
    }

    /// First matching rule's action, or `None` when no rule matches.
    pub fn decide(&self, relative: &str, is_dir: bool) -> Option<FilterAction> {
        self.rules
            .iter()
            .find(|rule| rule.matches(relative, is_dir))
            .map(FilterRule::action)
    }

    pub fn is_included(&self, relative: &str, is_dir: bool) -> bool {
        self.decide(relative, is_dir) != Some(FilterAction::Exclude)
    }

    pub fn is_path_included(&self, relative: &Path, is_dir: bool) -> bool {
        self.is_included(&to_rule_path(relative), is_dir)
    }

    /// Rule flags in declared order, followed by `--prune-empty-dirs` when enabled.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.rules.iter().map(FilterRule::to_arg).collect();
        if self.prune_empty_dirs {
            args.push("--prune-empty-dirs".to_string());
        }
        args
    }

    /// Walks `source_root` and returns what a filtered mirror of it would produce.
    pub fn plan(&self, source_root: &Path) -> Result<TransferPlan> {
        let mut files = Vec::new();
        let mut visited_dirs = Vec::new();

        let walker = WalkDir::new(source_root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                match entry.path().strip_prefix(source_root) {
                    Ok(rel) => self.is_path_included(rel, true),
                    Err(_) => false,
                }
            });

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Failed to walk directory: {}", source_root.display()))?;
            let rel = entry
                .path()
                .strip_prefix(source_root)
                .with_context(|| {
                    format!(
                        "Failed to strip prefix {} from {}",
                        source_root.display(),
                        entry.path().display()
                    )
                })?
                .to_path_buf();

            if entry.file_type().is_dir() {
                visited_dirs.push(rel);
            } else if self.is_path_included(&rel, false) {
                files.push(rel);
            }
        }

        let directories = if self.prune_empty_dirs {
            let mut kept = BTreeSet::new();
            for file in &files {
                let mut parent = file.parent();
                while let Some(dir) = parent {
                    if dir.as_os_str().is_empty() {
                        break;
                    }
                    kept.insert(dir.to_path_buf());
                    parent = dir.parent();
                }
            }
            kept.into_iter().collect()
        } else {
            visited_dirs
        };

        Ok(TransferPlan { files, directories })
    }
}

/// Renders a relative path with `/` separators, the form rules are matched against.
pub fn to_rule_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Character class names rsync accepts inside brackets, e.g. `[[:digit:]]`.
const POSIX_CLASSES: &[&str] = &[
    "alnum", "alpha", "blank", "cntrl", "digit", "graph", "lower", "print", "punct", "space",
    "upper", "xdigit",
];

fn glob_to_regex(glob: &str) -> Result<String, String> {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push_str(".*");
                i += 2;
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                if let Some((class, next)) = translate_class(&chars, i)? {
                    out.push_str(&class);
                    i = next;
                    continue;
                }
                out.push_str("\\[");
            }
            '\\' if i + 1 < chars.len() => {
                out.push_str(&regex::escape(&chars[i + 1].to_string()));
                i += 2;
                continue;
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    Ok(out)
}

/// Translates the bracket expression opening at `chars[open]`. Returns the regex class and the
/// index just past the closing `]`, or `None` when the bracket is never closed (a literal `[`).
fn translate_class(chars: &[char], open: usize) -> Result<Option<(String, usize)>, String> {
    let mut j = open + 1;
    let mut class = String::from("[");
    if matches!(chars.get(j), Some('!') | Some('^')) {
        class.push('^');
        j += 1;
    }
    // `[]...]` and `[!]...]` take the first `]` as a member, as in shell globs.
    if chars.get(j) == Some(&']') {
        class.push_str("\\]");
        j += 1;
    }

    while j < chars.len() {
        match chars[j] {
            ']' => {
                class.push(']');
                return Ok(Some((class, j + 1)));
            }
            '[' if chars.get(j + 1) == Some(&':') => {
                let rest: String = chars[j + 2..].iter().collect();
                let Some(end) = rest.find(":]") else {
                    return Err("unterminated character class name".to_string());
                };
                let name = &rest[..end];
                if !POSIX_CLASSES.contains(&name) {
                    return Err(format!("unknown character class [:{}:]", name));
                }
                class.push_str(&format!("[:{}:]", name));
                j += 2 + name.chars().count() + 2;
            }
            '\\' | '[' | '&' | '~' => {
                class.push('\\');
                class.push(chars[j]);
                j += 1;
            }
            c => {
                class.push(c);
                j += 1;
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn include(pattern: &str) -> Result<FilterRule, AppError> {
        FilterRule::new(FilterAction::Include, pattern)
    }

    fn exclude(pattern: &str) -> Result<FilterRule, AppError> {
        FilterRule::new(FilterAction::Exclude, pattern)
    }

    fn touch(root: &Path, rel: &str) -> anyhow::Result<()> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"%PDF-1.4")?;
        Ok(())
    }

    #[test]
    fn test_default_rules_render_in_declared_order() -> anyhow::Result<()> {
        let rules = FilterRuleSet::proceedings()?;
        assert_eq!(
            rules.to_args(),
            vec![
                "--include=*/",
                "--include=*.pdf",
                "--exclude=*",
                "--prune-empty-dirs",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_default_rules_keep_pdfs_and_directories_only() -> anyhow::Result<()> {
        let rules = FilterRuleSet::proceedings()?;
        assert!(rules.is_included("papers", true));
        assert!(rules.is_included("papers/2020", true));
        assert!(rules.is_included("papers/2020/a.pdf", false));
        assert!(!rules.is_included("papers/2020/notes.txt", false));
        assert!(!rules.is_included("README", false));
        // Case-sensitive, like rsync.
        assert!(!rules.is_included("papers/SCAN.PDF", false));
        Ok(())
    }

    #[test]
    fn test_first_matching_rule_wins() -> anyhow::Result<()> {
        let exclude_first = FilterRuleSet::parse(&["- secret.pdf", "+ *.pdf", "- *"], false)?;
        assert_eq!(exclude_first.decide("secret.pdf", false), Some(FilterAction::Exclude));
        assert_eq!(exclude_first.decide("public.pdf", false), Some(FilterAction::Include));

        let include_first = FilterRuleSet::parse(&["+ *.pdf", "- secret.pdf"], false)?;
        assert_eq!(include_first.decide("secret.pdf", false), Some(FilterAction::Include));
        Ok(())
    }

    #[test]
    fn test_unmatched_path_is_included() -> anyhow::Result<()> {
        let rules = FilterRuleSet::parse(&["- *.tmp"], false)?;
        assert_eq!(rules.decide("paper.pdf", false), None);
        assert!(rules.is_included("paper.pdf", false));
        Ok(())
    }

    #[test]
    fn test_trailing_slash_matches_directories_only() -> anyhow::Result<()> {
        let rule = include("*/")?;
        assert!(rule.matches("papers", true));
        assert!(!rule.matches("papers", false));
        Ok(())
    }

    #[test]
    fn test_anchored_and_path_patterns() -> anyhow::Result<()> {
        let anchored = exclude("/drafts/")?;
        assert!(anchored.matches("drafts", true));
        assert!(!anchored.matches("papers/drafts", true));

        let unanchored = exclude("2020/*.pdf")?;
        assert!(unanchored.matches("2020/a.pdf", false));
        assert!(unanchored.matches("papers/2020/a.pdf", false));
        assert!(!unanchored.matches("papers/2020/sub/a.pdf", false));

        let deep = include("papers/**")?;
        assert!(deep.matches("papers/2020/sub/a.pdf", false));
        Ok(())
    }

    #[test]
    fn test_wildcards_do_not_cross_separators() -> anyhow::Result<()> {
        let single = include("a?c.pdf")?;
        assert!(single.matches("abc.pdf", false));
        assert!(!single.matches("a/c.pdf", false));

        let class = include("vol[0-9].pdf")?;
        assert!(class.matches("x/vol7.pdf", false));
        assert!(!class.matches("volA.pdf", false));

        let negated = include("vol[!0-9].pdf")?;
        assert!(negated.matches("volA.pdf", false));
        assert!(!negated.matches("vol7.pdf", false));
        Ok(())
    }

    #[test]
    fn test_posix_character_classes() -> anyhow::Result<()> {
        let digit = include("vol[[:digit:]].pdf")?;
        assert!(digit.matches("vol7.pdf", false));
        assert!(!digit.matches("volA.pdf", false));

        let mixed = include("[[:upper:]_]*.pdf")?;
        assert!(mixed.matches("papers/Smith2020.pdf", false));
        assert!(mixed.matches("_draft.pdf", false));
        assert!(!mixed.matches("smith.pdf", false));

        let negated = include("vol[![:digit:]].pdf")?;
        assert!(negated.matches("volA.pdf", false));
        assert!(!negated.matches("vol7.pdf", false));
        Ok(())
    }

    #[test]
    fn test_posix_class_rules_feed_the_local_plan() -> anyhow::Result<()> {
        let remote = tempfile::tempdir()?;
        touch(remote.path(), "vol1.pdf")?;
        touch(remote.path(), "volX.pdf")?;

        let rules = FilterRuleSet::parse(&["+ vol[[:digit:]].pdf", "- *"], true)?;
        assert_eq!(rules.plan(remote.path())?.files, vec![PathBuf::from("vol1.pdf")]);
        Ok(())
    }

    #[test]
    fn test_unknown_or_unterminated_class_names_are_rejected() {
        assert!(matches!(
            "+ vol[[:digits:]].pdf".parse::<FilterRule>(),
            Err(AppError::InvalidFilterRule { .. })
        ));
        assert!("+ vol[[:digit].pdf".parse::<FilterRule>().is_err());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() -> anyhow::Result<()> {
        let rule = include("paper(1)+.pdf")?;
        assert!(rule.matches("paper(1)+.pdf", false));
        assert!(!rule.matches("paper1.pdf", false));
        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed_rules() {
        assert!("* .pdf".parse::<FilterRule>().is_err());
        assert!("+ ".parse::<FilterRule>().is_err());
        assert!("+ /".parse::<FilterRule>().is_err());
        assert!("include *.pdf".parse::<FilterRule>().is_err());
    }

    #[test]
    fn test_rule_display_round_trips_source_text() -> anyhow::Result<()> {
        let rule: FilterRule = "+ *.pdf".parse()?;
        assert_eq!(rule.to_string(), "+ *.pdf");
        assert_eq!(rule.to_arg(), "--include=*.pdf");
        Ok(())
    }

    #[test]
    fn test_plan_keeps_pdfs_and_prunes_empty_directories() -> anyhow::Result<()> {
        let remote = tempfile::tempdir()?;
        touch(remote.path(), "papers/2020/a.pdf")?;
        touch(remote.path(), "papers/2020/notes.txt")?;
        fs::create_dir_all(remote.path().join("papers/empty"))?;
        touch(remote.path(), "papers/misc/only-text.md")?;

        let plan = FilterRuleSet::proceedings()?.plan(remote.path())?;

        assert_eq!(plan.files, vec![PathBuf::from("papers/2020/a.pdf")]);
        assert_eq!(
            plan.directories,
            vec![PathBuf::from("papers"), PathBuf::from("papers/2020")]
        );
        Ok(())
    }

    #[test]
    fn test_plan_without_pruning_keeps_every_entered_directory() -> anyhow::Result<()> {
        let remote = tempfile::tempdir()?;
        touch(remote.path(), "papers/2020/a.pdf")?;
        fs::create_dir_all(remote.path().join("papers/empty"))?;

        let rules = FilterRuleSet::parse(DEFAULT_FILTER_RULES, false)?;
        let plan = rules.plan(remote.path())?;

        assert!(plan.directories.contains(&PathBuf::from("papers/empty")));
        assert_eq!(plan.files, vec![PathBuf::from("papers/2020/a.pdf")]);
        Ok(())
    }

    #[test]
    fn test_plan_skips_contents_of_excluded_directories() -> anyhow::Result<()> {
        let remote = tempfile::tempdir()?;
        touch(remote.path(), "drafts/wip.pdf")?;
        touch(remote.path(), "final/done.pdf")?;

        let rules = FilterRuleSet::parse(&["- drafts/", "+ */", "+ *.pdf", "- *"], true)?;
        let plan = rules.plan(remote.path())?;

        assert_eq!(plan.files, vec![PathBuf::from("final/done.pdf")]);
        Ok(())
    }
}
