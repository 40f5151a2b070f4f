//! The per-turn loop: prompt, stream, confirm, dispatch, continue, store.

use std::sync::Arc;

use chat_provider::{CompletionProvider, CompletionRequest, Message, Role};
use history_store::ConversationStore;
use termchat::{OutputGate, Style, Terminal, TerminalCmd};

use crate::config::DEFAULT_MAX_TOKENS;
use crate::continuation::{self, ContinuationComposer, DEFAULT_CONTINUATION_MAX_TOKENS};
use crate::detector::StreamingDetector;
use crate::dispatch::{dispatch, DispatchOutcome};
use crate::error::TurnError;
use crate::markup::INVOCATION_END;
use crate::parser::{close_truncated_invocation, contains_invocation};
use crate::prompt::continuation_system_prompt;
use crate::tools::{ToolExecutor, ToolOutput, ToolRegistry};

pub const PROMPT: &str = "> ";
pub const CONFIRM_PROMPT: &str = "Execute tool call? [y/N] ";
pub const ABORTED_NOTICE: &str = "Tool call aborted by user.";

/// How a turn ended. Errors are reported separately through `TurnError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply,
    Aborted,
    Unrecognized,
    ToolFailed,
    ToolExecuted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub system_prompt: String,
    pub max_tokens: u32,
    pub continuation_max_tokens: u32,
}

impl SessionOptions {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            continuation_max_tokens: DEFAULT_CONTINUATION_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32, continuation_max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self.continuation_max_tokens = continuation_max_tokens;
        self
    }
}

pub struct ChatSession {
    provider: Arc<dyn CompletionProvider>,
    tools: Box<dyn ToolExecutor>,
    registry: ToolRegistry,
    store: ConversationStore,
    system_prompt: String,
    continuation_prompt: String,
    max_tokens: u32,
    continuation_max_tokens: u32,
    output: OutputGate,
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        tools: Box<dyn ToolExecutor>,
        store: ConversationStore,
        options: SessionOptions,
    ) -> Self {
        let continuation_prompt = continuation_system_prompt(&options.system_prompt);
        Self {
            provider,
            tools,
            registry: ToolRegistry::builtin(),
            store,
            system_prompt: options.system_prompt,
            continuation_prompt,
            max_tokens: options.max_tokens,
            continuation_max_tokens: options.continuation_max_tokens,
            output: OutputGate::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Read-eval loop until an empty line, `exit`, `quit`, or end of input.
    ///
    /// Turn failures are printed and the loop continues. Only a failure to read
    /// the terminal ends the loop with an error.
    pub fn run<T: Terminal + ?Sized>(
        &mut self,
        term: &mut T,
        initial_query: Option<String>,
    ) -> Result<(), TurnError> {
        let mut pending = initial_query;
        if let Some(query) = &pending {
            self.output.push(TerminalCmd::Style(Style::User));
            self.output.push(TerminalCmd::text(format!("{PROMPT}{query}")));
            self.output.push(TerminalCmd::Style(Style::Reset));
            self.output.push(TerminalCmd::Newline);
            self.output.flush(&mut *term);
        }

        let result = loop {
            let input = match pending.take() {
                Some(query) => query,
                None => match self.prompt(&mut *term) {
                    Ok(Some(line)) if is_exit_command(line.trim()) => break Ok(()),
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(error) => break Err(error),
                },
            };
            let input = input.trim();

            match self.run_turn(&mut *term, input) {
                Ok(outcome) => tracing::debug!(?outcome, "turn finished"),
                Err(error) => self.report_error(&mut *term, &error),
            }
            if let Err(error) = self.store.save() {
                self.report_error(&mut *term, &TurnError::History(error));
            }
        };

        self.output.push(TerminalCmd::Style(Style::Reset));
        self.output.flush(term);
        result
    }

    /// One user turn. The user message and the resulting assistant message are
    /// appended to the store; a failed continuation still stores the envelope.
    pub fn run_turn<T: Terminal + ?Sized>(
        &mut self,
        term: &mut T,
        user_text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        tracing::info!(len = user_text.len(), "turn started");
        self.store.append(Message::user(user_text));

        let request = CompletionRequest::new(
            self.system_prompt.clone(),
            request_window(self.store.window(self.store.limit())),
            self.max_tokens,
        )
        .with_stop_sequence(INVOCATION_END);

        let provider = Arc::clone(&self.provider);
        let mut detector = StreamingDetector::new();
        let output = &mut self.output;
        let streamed = provider.stream(&request, &mut |chunk| {
            output.extend(detector.push(chunk));
            output.flush(&mut *term);
        });
        self.output.extend(detector.finish());
        self.output.flush(&mut *term);
        let message = streamed?.text;

        if !contains_invocation(&message) {
            self.store.append(Message::assistant(message));
            return Ok(TurnOutcome::Reply);
        }

        if !self.confirm(&mut *term)? {
            self.print_line(&mut *term, Style::Warning, ABORTED_NOTICE);
            self.store.append(Message::assistant(ABORTED_NOTICE));
            return Ok(TurnOutcome::Aborted);
        }

        match dispatch(&message, &self.registry, self.tools.as_mut()) {
            DispatchOutcome::NoInvocation => {
                self.store.append(Message::assistant(message));
                Ok(TurnOutcome::Reply)
            }
            DispatchOutcome::Unrecognized { tool_name } => {
                self.print_line(
                    &mut *term,
                    Style::Warning,
                    &format!("Unknown tool '{tool_name}'. Nothing was executed."),
                );
                self.store.append(Message::assistant(message));
                Ok(TurnOutcome::Unrecognized)
            }
            DispatchOutcome::Failed(error) => {
                self.print_line(&mut *term, Style::Error, &format!("Tool call failed: {error}"));
                let closed = close_truncated_invocation(&message);
                self.store.append(Message::assistant(format!(
                    "{}\n\n[Tool call failed: {error}]",
                    closed.trim_end()
                )));
                Ok(TurnOutcome::ToolFailed)
            }
            DispatchOutcome::Executed { tool_name, output } => {
                self.print_tool_summary(&mut *term, &tool_name, &output);
                let prefill = continuation::prefill(&message, &tool_name, &output);
                let composer = ContinuationComposer::new(
                    self.provider.as_ref(),
                    &self.continuation_prompt,
                    self.continuation_max_tokens,
                );
                match composer.continue_after(user_text, &prefill) {
                    Ok(text) => {
                        self.output.push(TerminalCmd::text(text.as_str()));
                        self.output.push(TerminalCmd::Newline);
                        self.output.flush(&mut *term);
                        self.store
                            .append(Message::assistant(continuation::merge(&prefill, &text)));
                        Ok(TurnOutcome::ToolExecuted)
                    }
                    Err(error) => {
                        tracing::warn!(%error, "continuation failed, storing tool result only");
                        self.store.append(Message::assistant(prefill));
                        Err(error.into())
                    }
                }
            }
        }
    }

    fn prompt<T: Terminal + ?Sized>(&mut self, term: &mut T) -> Result<Option<String>, TurnError> {
        self.output.push(TerminalCmd::Style(Style::User));
        self.output.push(TerminalCmd::TextStatic(PROMPT));
        self.output.flush(&mut *term);
        let line = term.read_line()?;
        self.output.push(TerminalCmd::Style(Style::Reset));
        if line.is_none() {
            self.output.push(TerminalCmd::Newline);
        }
        self.output.flush(term);
        Ok(line)
    }

    fn confirm<T: Terminal + ?Sized>(&mut self, term: &mut T) -> Result<bool, TurnError> {
        self.output.extend(TerminalCmd::styled(Style::Warning, CONFIRM_PROMPT));
        self.output.flush(&mut *term);
        let answer = term.read_line()?;
        let accepted = answer.as_deref().map(str::trim).is_some_and(|answer| {
            answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
        });
        tracing::debug!(accepted, "tool call confirmation");
        Ok(accepted)
    }

    fn print_tool_summary<T: Terminal + ?Sized>(
        &mut self,
        term: &mut T,
        tool_name: &str,
        output: &ToolOutput,
    ) {
        let mut lines = output.content.lines();
        let first = lines.next().unwrap_or("");
        let more = lines.count();
        let summary = if more > 0 {
            format!("{tool_name}: {first} (+{more} more lines)")
        } else {
            format!("{tool_name}: {first}")
        };
        let style = if output.ok { Style::Success } else { Style::Error };
        self.print_line(term, style, &summary);
    }

    fn print_line<T: Terminal + ?Sized>(&mut self, term: &mut T, style: Style, text: &str) {
        self.output.extend(TerminalCmd::styled(style, text));
        self.output.push(TerminalCmd::Newline);
        self.output.flush(term);
    }

    fn report_error<T: Terminal + ?Sized>(&mut self, term: &mut T, error: &TurnError) {
        tracing::warn!(%error, "turn failed");
        self.print_line(term, Style::Error, &format!("Error: {error}"));
    }
}

pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    input.is_empty() || input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Shape a store window for the provider: drop leading assistant messages and
/// merge consecutive messages of the same role, so roles always alternate
/// starting with the user.
pub fn request_window(messages: Vec<Message>) -> Vec<Message> {
    let mut window: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages
        .into_iter()
        .skip_while(|message| message.role == Role::Assistant)
    {
        match window.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => window.push(message),
        }
    }
    window
}
