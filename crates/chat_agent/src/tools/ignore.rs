//! `.gitignore`-style exclusion for the workspace tree listing.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use walkdir::WalkDir;

pub const DEFAULT_IGNORES: [&str; 3] = [".git", "target", "node_modules"];
pub const GITIGNORE_FILE: &str = ".gitignore";

#[derive(Debug, Clone)]
enum Rule {
    Literal { pattern: String, component_only: bool },
    Glob { pattern: glob::Pattern, component_only: bool },
}

impl Rule {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        if line.starts_with('!') {
            tracing::debug!(line, "negated ignore patterns are not supported");
            return None;
        }
        let pattern = line.trim_start_matches('/').trim_end_matches('/');
        if pattern.is_empty() {
            return None;
        }
        let component_only = !pattern.contains('/');

        if pattern.contains(['*', '?', '[']) {
            match glob::Pattern::new(pattern) {
                Ok(pattern) => {
                    return Some(Self::Glob {
                        pattern,
                        component_only,
                    })
                }
                Err(error) => {
                    tracing::warn!(%error, pattern, "invalid ignore glob, matching literally");
                }
            }
        }
        Some(Self::Literal {
            pattern: pattern.to_string(),
            component_only,
        })
    }

    fn matches(&self, relative: &str) -> bool {
        match self {
            Self::Literal {
                pattern,
                component_only,
            } => {
                relative == pattern
                    || relative
                        .strip_prefix(pattern.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
                    || (*component_only && relative.split('/').any(|part| part == pattern))
            }
            Self::Glob {
                pattern,
                component_only,
            } => {
                if *component_only {
                    relative.split('/').any(|part| pattern.matches(part))
                } else {
                    prefixes(relative).any(|prefix| pattern.matches(prefix))
                }
            }
        }
    }
}

/// `a/b/c` yields `a`, `a/b`, `a/b/c`.
fn prefixes(relative: &str) -> impl Iterator<Item = &str> {
    relative
        .match_indices('/')
        .map(move |(at, _)| &relative[..at])
        .chain(std::iter::once(relative))
}

#[derive(Debug, Clone)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::from_lines(DEFAULT_IGNORES)
    }
}

impl IgnoreRules {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rules: lines
                .into_iter()
                .filter_map(|line| Rule::parse(line.as_ref()))
                .collect(),
        }
    }

    /// Built-in defaults plus `<root>/.gitignore`, if readable.
    pub fn load(root: &Path) -> Self {
        let mut rules = Self::default();
        let path = root.join(GITIGNORE_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => rules.rules.extend(text.lines().filter_map(Rule::parse)),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!(%error, path = %path.display(), "failed to read ignore file");
            }
        }
        rules
    }

    /// `relative` is a root-relative POSIX path without a leading `./`.
    pub fn is_ignored(&self, relative: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(relative))
    }
}

/// Sorted root-relative POSIX paths under `start`, directories suffixed with `/`.
///
/// Ignored directories are not descended into. Returns the listing and whether
/// it was cut at `limit` entries.
pub fn list_tree(root: &Path, start: &Path, rules: &IgnoreRules, limit: usize) -> (Vec<String>, bool) {
    let relative_of = |path: &Path| -> Option<String> {
        let relative = path.strip_prefix(root).ok()?;
        let text = relative.to_string_lossy().replace('\\', "/");
        (!text.is_empty()).then_some(text)
    };

    let mut entries: Vec<String> = WalkDir::new(start)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            relative_of(entry.path()).map_or(true, |relative| !rules.is_ignored(&relative))
        })
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let relative = relative_of(entry.path())?;
            if entry.file_type().is_dir() {
                Some(format!("{relative}/"))
            } else {
                Some(relative)
            }
        })
        .collect();

    entries.sort();
    let truncated = entries.len() > limit;
    entries.truncate(limit);
    (entries, truncated)
}
