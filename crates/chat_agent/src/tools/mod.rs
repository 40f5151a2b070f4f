//! Local side-effecting operations the model may invoke.

mod ignore;
mod registry;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::ToolError;

pub use ignore::{list_tree, IgnoreRules, DEFAULT_IGNORES};
pub use registry::{ParamKind, ParamSpec, ToolKind, ToolRegistry, ToolSpec, BUILTIN_TOOLS};

const DEFAULT_READ_MAX_BYTES: usize = 200 * 1024;
pub const DEFAULT_LIST_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    WriteFile { path: String, content: String },
    WriteFiles { files: BTreeMap<String, String> },
    ReadFile { path: String },
    ReadFiles { paths: Vec<String> },
    ListFiles { path: Option<String> },
}

impl ToolCall {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::WriteFile { .. } => "write_file",
            Self::WriteFiles { .. } => "write_files",
            Self::ReadFile { .. } => "read_file",
            Self::ReadFiles { .. } => "read_files",
            Self::ListFiles { .. } => "list_files",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub ok: bool,
    pub content: String,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
        }
    }

    pub fn fail(content: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: content.into(),
        }
    }
}

/// Executes one bound call.
///
/// `Ok(ToolOutput::fail(..))` is a result the model should see. `Err` means the
/// operation itself broke and the turn should report it instead of continuing.
pub trait ToolExecutor {
    fn execute(&mut self, call: ToolCall) -> Result<ToolOutput, ToolError>;
}

enum OpFailure {
    Rejected(String),
    Io(String),
}

enum ReadOutcome {
    Found(String),
    NotFound,
    NotText,
}

/// Filesystem tools confined to one workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceTools {
    workspace_root: PathBuf,
    read_max_bytes: usize,
    list_limit: usize,
}

impl WorkspaceTools {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Result<Self, String> {
        let workspace_root = workspace_root.into();
        let canonical_root = workspace_root
            .canonicalize()
            .map_err(|err| format!("Failed to resolve workspace root: {err}"))?;

        if !canonical_root.is_dir() {
            return Err("Workspace root must be a directory".to_string());
        }

        Ok(Self {
            workspace_root: canonical_root,
            read_max_bytes: DEFAULT_READ_MAX_BYTES,
            list_limit: DEFAULT_LIST_LIMIT,
        })
    }

    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn write_one(&self, path: &str, content: &str) -> Result<String, OpFailure> {
        let resolved = self.resolve_path(path).map_err(OpFailure::Rejected)?;

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                OpFailure::Io(format!(
                    "Failed to create parent directories for {path}: {error}"
                ))
            })?;
            let canonical_parent = parent.canonicalize().map_err(|error| {
                OpFailure::Io(format!("Failed to resolve write parent for {path}: {error}"))
            })?;
            self.ensure_inside_workspace(&canonical_parent)
                .map_err(OpFailure::Rejected)?;
        }

        fs::write(&resolved, content)
            .map_err(|error| OpFailure::Io(format!("Failed to write {path}: {error}")))?;

        tracing::info!(path, bytes = content.len(), "wrote file");
        Ok(format!("Wrote {path} ({} bytes)", content.len()))
    }

    fn read_one(&self, path: &str) -> Result<ReadOutcome, OpFailure> {
        let resolved = self.resolve_path(path).map_err(OpFailure::Rejected)?;
        let canonical = match resolved.canonicalize() {
            Ok(canonical) => canonical,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::NotFound),
            Err(error) => {
                return Err(OpFailure::Io(format!("Failed to resolve {path}: {error}")))
            }
        };
        self.ensure_inside_workspace(&canonical)
            .map_err(OpFailure::Rejected)?;
        if canonical.is_dir() {
            return Err(OpFailure::Rejected(format!("{path} is a directory")));
        }

        let bytes = fs::read(&canonical)
            .map_err(|error| OpFailure::Io(format!("Failed to read {path}: {error}")))?;
        if bytes.len() > self.read_max_bytes {
            return Err(OpFailure::Rejected(format!(
                "{path} exceeds max read size ({} bytes > {} bytes)",
                bytes.len(),
                self.read_max_bytes
            )));
        }

        tracing::info!(path, bytes = bytes.len(), "read file");
        Ok(String::from_utf8(bytes).map_or(ReadOutcome::NotText, ReadOutcome::Found))
    }

    fn execute_write_file(&self, path: String, content: String) -> Result<ToolOutput, ToolError> {
        match self.write_one(&path, &content) {
            Ok(line) => Ok(ToolOutput::ok(line)),
            Err(OpFailure::Rejected(message)) => Ok(ToolOutput::fail(message)),
            Err(OpFailure::Io(message)) => Err(ToolError::execution("write_file", message)),
        }
    }

    /// Each file is written independently; earlier writes stay on later failure.
    fn execute_write_files(&self, files: BTreeMap<String, String>) -> ToolOutput {
        if files.is_empty() {
            return ToolOutput::fail("No files given");
        }

        let mut all_ok = true;
        let lines: Vec<String> = files
            .iter()
            .map(|(path, content)| match self.write_one(path, content) {
                Ok(line) => line,
                Err(OpFailure::Rejected(message) | OpFailure::Io(message)) => {
                    all_ok = false;
                    message
                }
            })
            .collect();

        let summary = lines.join("\n");
        if all_ok {
            ToolOutput::ok(summary)
        } else {
            ToolOutput::fail(summary)
        }
    }

    fn execute_read_file(&self, path: String) -> Result<ToolOutput, ToolError> {
        match self.read_one(&path) {
            Ok(ReadOutcome::Found(content)) => Ok(ToolOutput::ok(content)),
            Ok(ReadOutcome::NotFound) => Ok(ToolOutput::ok(format!("File not found: {path}"))),
            Ok(ReadOutcome::NotText) => Ok(ToolOutput::fail(format!(
                "{path} is not valid UTF-8 text"
            ))),
            Err(OpFailure::Rejected(message)) => Ok(ToolOutput::fail(message)),
            Err(OpFailure::Io(message)) => Err(ToolError::execution("read_file", message)),
        }
    }

    fn execute_read_files(&self, paths: Vec<String>) -> ToolOutput {
        if paths.is_empty() {
            return ToolOutput::fail("No paths given");
        }

        let mut all_ok = true;
        let blocks: Vec<String> = paths
            .iter()
            .map(|path| match self.read_one(path) {
                Ok(ReadOutcome::Found(content)) => {
                    format!("<file path=\"{path}\">\n{content}\n</file>")
                }
                Ok(ReadOutcome::NotFound) => format!("File not found: {path}"),
                Ok(ReadOutcome::NotText) => {
                    all_ok = false;
                    format!("{path} is not valid UTF-8 text")
                }
                Err(OpFailure::Rejected(message) | OpFailure::Io(message)) => {
                    all_ok = false;
                    message
                }
            })
            .collect();

        let joined = blocks.join("\n");
        if all_ok {
            ToolOutput::ok(joined)
        } else {
            ToolOutput::fail(joined)
        }
    }

    fn execute_list_files(&self, path: Option<String>) -> ToolOutput {
        let path = path.unwrap_or_else(|| ".".to_string());
        let start = match self.resolve_path(&path) {
            Ok(start) => start,
            Err(error) => return ToolOutput::fail(error),
        };
        let start = match start.canonicalize() {
            Ok(start) => start,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return ToolOutput::ok(format!("File not found: {path}"))
            }
            Err(error) => return ToolOutput::fail(format!("Failed to resolve {path}: {error}")),
        };
        if let Err(error) = self.ensure_inside_workspace(&start) {
            return ToolOutput::fail(error);
        }

        ToolOutput::ok(self.tree_listing(&start))
    }

    /// Rendered listing of `start`, one entry per line.
    pub fn tree_listing(&self, start: &Path) -> String {
        let rules = IgnoreRules::load(&self.workspace_root);
        let (mut entries, truncated) =
            list_tree(&self.workspace_root, start, &rules, self.list_limit);
        if truncated {
            entries.push("... (truncated)".to_string());
        }
        entries.join("\n")
    }

    /// Workspace-relative target for `path`. Absolute paths and lexical escapes
    /// are rejected; symlink escapes are caught against the nearest existing ancestor.
    fn resolve_path(&self, path: &str) -> Result<PathBuf, String> {
        if path.trim().is_empty() {
            return Err("Path must not be empty".to_string());
        }

        let relative = Path::new(path);
        if relative.is_absolute() || relative.has_root() {
            return Err(format!("Absolute paths are not allowed: {path}"));
        }
        if escapes_lexically(relative) {
            return Err(format!("Path escapes workspace root: {path}"));
        }

        let candidate = self.workspace_root.join(relative);
        let anchor = canonicalize_existing_ancestor(&candidate)?;
        self.ensure_inside_workspace(&anchor)?;
        Ok(candidate)
    }

    fn ensure_inside_workspace(&self, canonical_path: &Path) -> Result<(), String> {
        if canonical_path.starts_with(&self.workspace_root) {
            Ok(())
        } else {
            Err(format!(
                "Path escapes workspace root: {}",
                canonical_path.display()
            ))
        }
    }
}

impl ToolExecutor for WorkspaceTools {
    fn execute(&mut self, call: ToolCall) -> Result<ToolOutput, ToolError> {
        tracing::debug!(tool = call.tool_name(), "executing tool call");
        match call {
            ToolCall::WriteFile { path, content } => self.execute_write_file(path, content),
            ToolCall::WriteFiles { files } => Ok(self.execute_write_files(files)),
            ToolCall::ReadFile { path } => self.execute_read_file(path),
            ToolCall::ReadFiles { paths } => Ok(self.execute_read_files(paths)),
            ToolCall::ListFiles { path } => Ok(self.execute_list_files(path)),
        }
    }
}

fn escapes_lexically(path: &Path) -> bool {
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::ParentDir => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return true,
            },
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

fn canonicalize_existing_ancestor(path: &Path) -> Result<PathBuf, String> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            return ancestor
                .canonicalize()
                .map_err(|error| format!("Failed to resolve {}: {error}", ancestor.display()));
        }
    }

    Err(format!(
        "No existing ancestor directory found for {}",
        path.display()
    ))
}
