//! Single-shot dispatch of the first invocation in a message.

use crate::error::ToolError;
use crate::parser::{invocation_blocks, ToolInvocation};
use crate::tools::{ToolExecutor, ToolOutput, ToolRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message holds no invocation markup.
    NoInvocation,
    /// The first invocation names a tool the registry does not know. Nothing ran.
    Unrecognized { tool_name: String },
    Executed { tool_name: String, output: ToolOutput },
    /// The first invocation could not be parsed, bound, or executed.
    Failed(ToolError),
}

/// Run at most one tool for `message`.
///
/// Invocations are considered in order and the first one ends the batch,
/// whether it ran, failed, or named an unknown tool. Later invocations are
/// never parsed or executed.
pub fn dispatch(
    message: &str,
    registry: &ToolRegistry,
    executor: &mut dyn ToolExecutor,
) -> DispatchOutcome {
    let blocks = match invocation_blocks(message) {
        Ok(blocks) => blocks,
        Err(error) => return DispatchOutcome::Failed(error),
    };
    let Some(first) = blocks.first() else {
        return DispatchOutcome::NoInvocation;
    };
    if blocks.len() > 1 {
        tracing::debug!(ignored = blocks.len() - 1, "ignoring trailing invocations in batch");
    }

    let invocation = match ToolInvocation::from_block(first) {
        Ok(invocation) => invocation,
        Err(error) => return DispatchOutcome::Failed(error),
    };
    let call = match registry.bind(&invocation) {
        None => {
            tracing::debug!(tool = %invocation.tool_name, "unrecognized tool, nothing executed");
            return DispatchOutcome::Unrecognized {
                tool_name: invocation.tool_name,
            };
        }
        Some(Err(error)) => {
            tracing::warn!(%error, "tool parameters rejected");
            return DispatchOutcome::Failed(error);
        }
        Some(Ok(call)) => call,
    };

    match executor.execute(call) {
        Ok(output) => {
            tracing::info!(tool = %invocation.tool_name, ok = output.ok, "tool executed");
            DispatchOutcome::Executed {
                tool_name: invocation.tool_name,
                output,
            }
        }
        Err(error) => {
            tracing::warn!(%error, "tool execution failed");
            DispatchOutcome::Failed(error)
        }
    }
}
