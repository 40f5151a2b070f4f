#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use chat_agent::{ChatSession, SessionOptions, WorkspaceTools};
use chat_provider::CompletionProvider;
use history_store::ConversationStore;
use termchat::Terminal;

/// Terminal that replays scripted input lines and records every write.
#[derive(Default)]
pub struct ScriptedTerminal {
    pub writes: Vec<String>,
    pub flushes: usize,
    input: VecDeque<String>,
}

impl ScriptedTerminal {
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn output(&self) -> String {
        self.writes.concat()
    }

    /// Output with ANSI escape sequences removed.
    pub fn plain_output(&self) -> String {
        strip_ansi(&self.output())
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

impl Terminal for ScriptedTerminal {
    fn write(&mut self, data: &str) {
        self.writes.push(data.to_string());
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }
}

pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn session(
    workspace: &Path,
    provider: Arc<dyn CompletionProvider>,
    store: ConversationStore,
) -> ChatSession {
    let tools = WorkspaceTools::new(workspace).expect("workspace root should be valid");
    ChatSession::new(
        provider,
        Box::new(tools),
        store,
        SessionOptions::new("You are a terminal assistant."),
    )
}

/// A reply that writes one file, closed the way a model would emit it.
pub fn write_file_reply(path: &str, content: &str) -> String {
    format!(
        "I'll save that for you.\n<function_calls>\n<invoke>\n<tool_name>write_file</tool_name>\n<parameters>\n<path>{path}</path>\n<content>\n{content}\n</content>\n</parameters>\n</invoke>\n</function_calls>\nthis text is never generated"
    )
}

pub fn invoke_reply(tool_name: &str, parameters: &str) -> String {
    format!(
        "Let me check.\n<function_calls>\n<invoke>\n<tool_name>{tool_name}</tool_name>\n<parameters>\n{parameters}\n</parameters>\n</invoke>\n</function_calls>"
    )
}
