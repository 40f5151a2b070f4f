use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value;

use super::ToolCall;
use crate::error::ToolError;
use crate::parser::ToolInvocation;
use crate::tags::strip_layout_newlines;

/// How a raw parameter value is normalized before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Trimmed.
    Path,
    /// Verbatim, minus one layout newline on each side.
    Text,
    /// Trimmed, then decoded as JSON.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    WriteFile,
    WriteFiles,
    ReadFile,
    ReadFiles,
    ListFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub kind: ToolKind,
}

const fn param(
    name: &'static str,
    description: &'static str,
    kind: ParamKind,
    required: bool,
) -> ParamSpec {
    ParamSpec {
        name,
        description,
        kind,
        required,
    }
}

pub const BUILTIN_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "write_file",
        description: "Write one file relative to the working directory, creating parent directories as needed.",
        params: &[
            param("path", "Relative path of the file to write.", ParamKind::Path, true),
            param("content", "Full file content.", ParamKind::Text, true),
        ],
        kind: ToolKind::WriteFile,
    },
    ToolSpec {
        name: "write_files",
        description: "Write several files at once. Each file is written independently.",
        params: &[param(
            "files",
            "JSON object mapping relative paths to file content.",
            ParamKind::Json,
            true,
        )],
        kind: ToolKind::WriteFiles,
    },
    ToolSpec {
        name: "read_file",
        description: "Read one UTF-8 text file relative to the working directory.",
        params: &[param("path", "Relative path of the file to read.", ParamKind::Path, true)],
        kind: ToolKind::ReadFile,
    },
    ToolSpec {
        name: "read_files",
        description: "Read several UTF-8 text files at once.",
        params: &[param(
            "paths",
            "JSON array of relative paths.",
            ParamKind::Json,
            true,
        )],
        kind: ToolKind::ReadFiles,
    },
    ToolSpec {
        name: "list_files",
        description: "List the files under a directory, honoring .gitignore.",
        params: &[param(
            "path",
            "Relative directory to list. Defaults to the working directory.",
            ParamKind::Path,
            false,
        )],
        kind: ToolKind::ListFiles,
    },
];

/// Fixed mapping from tool name to schema and operation.
#[derive(Debug, Clone, Copy)]
pub struct ToolRegistry {
    specs: &'static [ToolSpec],
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRegistry {
    pub const fn builtin() -> Self {
        Self {
            specs: BUILTIN_TOOLS,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn specs(&self) -> &'static [ToolSpec] {
        self.specs
    }

    /// Bind an invocation to a concrete call. `None` means the tool is unknown.
    pub fn bind(&self, invocation: &ToolInvocation) -> Option<Result<ToolCall, ToolError>> {
        self.get(&invocation.tool_name)
            .map(|spec| spec.bind(invocation))
    }

    /// Human-readable catalogue for the system prompt.
    pub fn render_catalogue(&self) -> String {
        let mut out = String::new();
        for spec in self.specs {
            let _ = writeln!(out, "- {}: {}", spec.name, spec.description);
            for param in spec.params {
                let requirement = if param.required { "required" } else { "optional" };
                let _ = writeln!(
                    out,
                    "    <{0}> ({requirement}): {1}",
                    param.name, param.description
                );
            }
        }
        out
    }
}

impl ToolSpec {
    pub fn bind(&self, invocation: &ToolInvocation) -> Result<ToolCall, ToolError> {
        let mut values = BTreeMap::new();
        for param in self.params {
            let Some(raw) = invocation.raw_parameter(param.name) else {
                if param.required {
                    return Err(ToolError::parameter(
                        self.name,
                        format!("missing <{}>", param.name),
                    ));
                }
                continue;
            };
            let value = match param.kind {
                ParamKind::Path | ParamKind::Json => raw.trim().to_string(),
                ParamKind::Text => strip_layout_newlines(&raw).to_string(),
            };
            values.insert(param.name, value);
        }

        let mut take = |name: &str| values.remove(name).unwrap_or_default();
        let call = match self.kind {
            ToolKind::WriteFile => ToolCall::WriteFile {
                path: take("path"),
                content: take("content"),
            },
            ToolKind::WriteFiles => ToolCall::WriteFiles {
                files: self.decode_files(&take("files"))?,
            },
            ToolKind::ReadFile => ToolCall::ReadFile { path: take("path") },
            ToolKind::ReadFiles => ToolCall::ReadFiles {
                paths: self.decode_paths(&take("paths"))?,
            },
            ToolKind::ListFiles => ToolCall::ListFiles {
                path: Some(take("path")).filter(|path| !path.is_empty()),
            },
        };
        Ok(call)
    }

    fn decode_files(&self, raw: &str) -> Result<BTreeMap<String, String>, ToolError> {
        serde_json::from_str(raw)
            .map_err(|error| ToolError::parameter(self.name, format!("files is not a JSON object of strings: {error}")))
    }

    fn decode_paths(&self, raw: &str) -> Result<Vec<String>, ToolError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(path) => Ok(path),
                    other => Err(ToolError::parameter(
                        self.name,
                        format!("paths must contain strings, found {other}"),
                    )),
                })
                .collect(),
            Ok(other) => Err(ToolError::parameter(
                self.name,
                format!("paths must be a JSON array, found {other}"),
            )),
            Err(error) => Err(ToolError::parameter(
                self.name,
                format!("paths is not valid JSON: {error}"),
            )),
        }
    }
}
