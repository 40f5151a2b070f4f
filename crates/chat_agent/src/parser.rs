//! Invocation parsing over a complete, possibly stop-truncated, assistant message.

use std::borrow::Cow;

use crate::error::ToolError;
use crate::markup::{
    BATCH_TAG, INVOCATION_END, INVOCATION_START, INVOKE_TAG, PARAMETERS_TAG, TOOL_NAME_TAG,
};
use crate::tags::{extract_first, extract_tags};

/// One `<invoke>` block resolved to a tool name and its raw parameter markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool_name: String,
    parameters: String,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters: parameters.into(),
        }
    }

    /// Resolve one `<invoke>` body. The first `<tool_name>` wins.
    pub fn from_block(block: &str) -> Result<Self, ToolError> {
        let tool_name = extract_first(TOOL_NAME_TAG, block, true)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ToolError::malformed("invoke block has no <tool_name>"))?;
        let parameters =
            extract_first(PARAMETERS_TAG, block, false).unwrap_or_else(|| block.to_string());
        Ok(Self::new(tool_name, parameters))
    }

    /// Raw text of one parameter tag, untrimmed.
    pub fn raw_parameter(&self, name: &str) -> Option<String> {
        extract_first(name, &self.parameters, false)
    }
}

/// Re-append the end marker the provider withheld as its stop sequence.
///
/// Only applies when a start marker is left unclosed; well-formed or marker-free
/// text is returned unchanged.
pub fn close_truncated_invocation(message: &str) -> Cow<'_, str> {
    let opened = message.matches(INVOCATION_START).count();
    let closed = message.matches(INVOCATION_END).count();
    if opened > closed {
        Cow::Owned(format!("{message}{INVOCATION_END}"))
    } else {
        Cow::Borrowed(message)
    }
}

pub fn contains_invocation(message: &str) -> bool {
    message.contains(INVOCATION_START)
}

/// The raw `<invoke>` bodies of every batch, in message order.
///
/// A message without a start marker has no blocks. A message that opens a
/// batch but holds no `<invoke>` block is malformed.
pub fn invocation_blocks(message: &str) -> Result<Vec<String>, ToolError> {
    if !contains_invocation(message) {
        return Ok(Vec::new());
    }

    let closed = close_truncated_invocation(message);
    let blocks: Vec<String> = extract_tags(BATCH_TAG, &closed, false)
        .iter()
        .flat_map(|batch| extract_tags(INVOKE_TAG, batch, false))
        .collect();

    if blocks.is_empty() {
        return Err(ToolError::malformed(
            "<function_calls> contains no <invoke> block",
        ));
    }
    tracing::debug!(count = blocks.len(), "invocation blocks extracted");
    Ok(blocks)
}

/// Resolve every block eagerly. The first malformed block fails the whole parse.
pub fn parse_invocations(message: &str) -> Result<Vec<ToolInvocation>, ToolError> {
    invocation_blocks(message)?
        .iter()
        .map(|block| ToolInvocation::from_block(block))
        .collect()
}
