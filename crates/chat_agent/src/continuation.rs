//! Follow-up completion after a tool ran.

use chat_provider::{CompletionProvider, CompletionRequest, Message, ProviderError};

use crate::markup::{
    ERROR_TAG, INVOCATION_START, RESULTS_TAG, RESULT_TAG, STDOUT_TAG, TOOL_NAME_TAG,
};
use crate::parser::close_truncated_invocation;
use crate::tools::ToolOutput;

/// Appended after the envelope so the model picks up with a short wrap-up.
pub const STEERING_PHRASE: &str = "Summary of the result and next step:";

pub const DEFAULT_CONTINUATION_MAX_TOKENS: u32 = 512;

/// Tool result in the tagged envelope the model expects.
pub fn results_envelope(tool_name: &str, output: &ToolOutput) -> String {
    let body_tag = if output.ok { STDOUT_TAG } else { ERROR_TAG };
    format!(
        "<{RESULTS_TAG}>\n<{RESULT_TAG}>\n<{TOOL_NAME_TAG}>{tool_name}</{TOOL_NAME_TAG}>\n<{body_tag}>\n{}\n</{body_tag}>\n</{RESULT_TAG}>\n</{RESULTS_TAG}>",
        output.content
    )
}

/// Closed assistant message, envelope, and steering phrase.
///
/// Ends without whitespace so it is accepted as an assistant prefill.
pub fn prefill(message: &str, tool_name: &str, output: &ToolOutput) -> String {
    let closed = close_truncated_invocation(message);
    format!(
        "{}\n\n{}\n\n{STEERING_PHRASE}",
        closed.trim_end(),
        results_envelope(tool_name, output)
    )
}

/// The stored assistant turn: prefill followed by the continuation text.
pub fn merge(prefill: &str, continuation: &str) -> String {
    let continuation = continuation.trim();
    if continuation.is_empty() {
        prefill.to_string()
    } else {
        format!("{prefill} {continuation}")
    }
}

/// Issues the non-streaming second call.
pub struct ContinuationComposer<'a> {
    provider: &'a dyn CompletionProvider,
    system_prompt: &'a str,
    max_tokens: u32,
}

impl<'a> ContinuationComposer<'a> {
    pub fn new(provider: &'a dyn CompletionProvider, system_prompt: &'a str, max_tokens: u32) -> Self {
        Self {
            provider,
            system_prompt,
            max_tokens,
        }
    }

    /// Two-message context: the user query and the envelope-augmented prefill.
    ///
    /// The start marker is a stop sequence so a stray invocation is cut before it begins.
    pub fn request(&self, user_query: &str, prefill: &str) -> CompletionRequest {
        CompletionRequest::new(
            self.system_prompt,
            vec![Message::user(user_query), Message::assistant(prefill)],
            self.max_tokens,
        )
        .with_stop_sequence(INVOCATION_START)
    }

    /// Continuation text, trimmed.
    pub fn continue_after(&self, user_query: &str, prefill: &str) -> Result<String, ProviderError> {
        let request = self.request(user_query, prefill);
        let completion = self.provider.complete(&request)?;
        tracing::debug!(len = completion.text.len(), "continuation received");
        Ok(completion.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_stdout_for_success_and_error_for_failure() {
        let ok = results_envelope("read_file", &ToolOutput::ok("hello"));
        assert_eq!(
            ok,
            "<function_results>\n<result>\n<tool_name>read_file</tool_name>\n<stdout>\nhello\n</stdout>\n</result>\n</function_results>"
        );
        let failed = results_envelope("write_file", &ToolOutput::fail("Absolute paths are not allowed: /x"));
        assert!(failed.contains("<error>\nAbsolute paths are not allowed: /x\n</error>"));
        assert!(!failed.contains("<stdout>"));
    }

    #[test]
    fn prefill_closes_the_batch_and_ends_with_the_steering_phrase() {
        let message = "Saving.\n<function_calls>\n<invoke><tool_name>write_file</tool_name></invoke>\n";
        let text = prefill(message, "write_file", &ToolOutput::ok("Wrote a (1 bytes)"));
        assert!(text.starts_with("Saving.\n<function_calls>"));
        assert!(text.contains("</invoke>\n</function_calls>\n\n<function_results>"));
        assert!(text.ends_with(STEERING_PHRASE));
    }

    #[test]
    fn merge_joins_with_a_single_space() {
        assert_eq!(merge("prefill:", "  Done.\n"), "prefill: Done.");
        assert_eq!(merge("prefill:", "   "), "prefill:");
    }
}
