use std::path::PathBuf;

const UNKNOWN: &str = "N/A";

/// Process environment captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub platform: String,
    pub terminal: String,
    pub shell: String,
    pub working_dir: PathBuf,
}

impl SessionContext {
    pub fn new(
        platform: impl Into<String>,
        terminal: impl Into<String>,
        shell: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platform: platform.into(),
            terminal: terminal.into(),
            shell: shell.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Read `TERM` and `SHELL` through `lookup`; missing or blank values become `N/A`.
    pub fn capture<F>(working_dir: impl Into<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        Self::new(std::env::consts::OS, read("TERM"), read("SHELL"), working_dir)
    }
}
