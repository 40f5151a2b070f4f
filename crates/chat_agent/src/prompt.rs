//! System prompt composition.

use std::fmt::Write as _;

use crate::context::SessionContext;
use crate::markup::{INVOCATION_END, INVOCATION_START};
use crate::tools::ToolRegistry;

const PERSISTED_MEMORY: &str = "You are capable of remembering previous interactions. Your conversation history is stored to a file and loaded into your memory. Use this to improve your responses.";
const SESSION_MEMORY: &str = "You are capable of remembering previous interactions, but only within this session. Your conversation history is not currently stored between sessions.";

pub const CONTINUATION_ADDENDUM: &str = "Tool calls are not available for this reply. Do not emit <function_calls>. Briefly summarize the tool result and suggest a next step.";

pub fn build_system_prompt(
    context: &SessionContext,
    persisted_memory: bool,
    registry: &ToolRegistry,
) -> String {
    let memory = if persisted_memory {
        PERSISTED_MEMORY
    } else {
        SESSION_MEMORY
    };

    let mut prompt = format!(
        "Your primary function is to assist the user with tasks related to terminal commands in their respective platform. \
You can also help with code and other queries. \
The user's platform is {} and their terminal is {} running the {} shell. \
The current working directory is {}. \
Use formatting appropriate for the user's terminal. {memory}",
        context.platform,
        context.terminal,
        context.shell,
        context.working_dir.display(),
    );

    let _ = write!(
        prompt,
        "\n\nYou can read and write files in the working directory with these tools:\n{}\
\nTo call a tool, reply with exactly this markup and nothing after it:\n\
{INVOCATION_START}\n<invoke>\n<tool_name>TOOL</tool_name>\n<parameters>\n<PARAM>VALUE</PARAM>\n</parameters>\n</invoke>\n{INVOCATION_END}\n\
Paths are relative to the working directory. Only the first invocation in a reply is executed, and the user confirms it first.",
        registry.render_catalogue()
    );
    prompt
}

pub fn continuation_system_prompt(system_prompt: &str) -> String {
    format!("{system_prompt}\n\n{CONTINUATION_ADDENDUM}")
}
