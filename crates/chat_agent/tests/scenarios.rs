mod support;

use std::fs;
use std::sync::{Arc, Mutex};

use chat_agent::app::{ABORTED_NOTICE, CONFIRM_PROMPT};
use chat_agent::continuation::STEERING_PHRASE;
use chat_agent::markup::{INVOCATION_END, INVOCATION_START};
use chat_agent::prompt::CONTINUATION_ADDENDUM;
use chat_agent::{TurnError, TurnOutcome};
use chat_provider::{
    Completion, CompletionProvider, CompletionRequest, Message, ProviderError, ProviderProfile,
    Role, StopReason,
};
use chat_provider_mock::MockProvider;
use history_store::{ConversationStore, HistoryFile};
use pretty_assertions::assert_eq;
use support::{invoke_reply, session, write_file_reply, ScriptedTerminal};
use tempfile::tempdir;

#[test]
fn plain_reply_is_stored_verbatim_without_side_effects() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(MockProvider::new().with_streamed_reply("Run ls -la to list files."));
    let mut chat = session(workspace.path(), provider.clone(), ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::default();

    let outcome = chat.run_turn(&mut terminal, "list files").expect("turn");

    assert_eq!(outcome, TurnOutcome::Reply);
    assert_eq!(
        chat.store().session(),
        &[
            Message::user("list files"),
            Message::assistant("Run ls -la to list files.")
        ]
    );
    assert_eq!(fs::read_dir(workspace.path()).expect("workspace").count(), 0);
    assert_eq!(terminal.plain_output(), "Run ls -la to list files.\n");
    assert!(!terminal.output().contains(CONFIRM_PROMPT));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].stop_sequences, vec![INVOCATION_END.to_string()]);
    assert_eq!(requests[0].messages, vec![Message::user("list files")]);
}

#[test]
fn confirmed_write_creates_the_file_and_stores_envelope_with_summary() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(
        MockProvider::new()
            .with_streamed_reply(write_file_reply("notes/todo.txt", "buy milk"))
            .with_completion_reply("Saved your todo. Next, view it with cat notes/todo.txt."),
    );
    let mut chat = session(workspace.path(), provider.clone(), ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["y"]);

    let outcome = chat.run_turn(&mut terminal, "remember to buy milk").expect("turn");

    assert_eq!(outcome, TurnOutcome::ToolExecuted);
    assert_eq!(
        fs::read_to_string(workspace.path().join("notes/todo.txt")).expect("todo written"),
        "buy milk"
    );

    let stored = &chat.store().session()[1];
    assert_eq!(stored.role, Role::Assistant);
    assert!(stored.content.starts_with("I'll save that for you.\n<function_calls>"));
    assert!(stored.content.contains("</invoke>\n</function_calls>\n\n<function_results>"));
    assert!(stored
        .content
        .contains("<stdout>\nWrote notes/todo.txt (8 bytes)\n</stdout>"));
    assert!(stored.content.ends_with(&format!(
        "{STEERING_PHRASE} Saved your todo. Next, view it with cat notes/todo.txt."
    )));
    assert!(!stored.content.contains("never generated"));

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let continuation = &requests[1];
    assert!(continuation.system.ends_with(CONTINUATION_ADDENDUM));
    assert_eq!(continuation.max_tokens, 512);
    assert_eq!(continuation.messages.len(), 2);
    assert_eq!(continuation.messages[0], Message::user("remember to buy milk"));
    assert_eq!(continuation.messages[1].role, Role::Assistant);
    assert!(continuation.messages[1].content.ends_with(STEERING_PHRASE));

    let plain = terminal.plain_output();
    assert!(plain.contains(CONFIRM_PROMPT));
    assert!(plain.contains("write_file: Wrote notes/todo.txt (8 bytes)"));
    assert!(plain.contains("Saved your todo."));
}

#[test]
fn declined_confirmation_stores_the_abort_notice() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(
        MockProvider::new().with_streamed_reply(write_file_reply("notes/todo.txt", "buy milk")),
    );
    let mut chat = session(workspace.path(), provider.clone(), ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["n"]);

    let outcome = chat.run_turn(&mut terminal, "remember to buy milk").expect("turn");

    assert_eq!(outcome, TurnOutcome::Aborted);
    assert!(!workspace.path().join("notes").exists());
    assert_eq!(chat.store().session()[1], Message::assistant(ABORTED_NOTICE));
    assert_eq!(provider.requests().len(), 1);
    assert!(terminal.plain_output().contains(ABORTED_NOTICE));
}

#[test]
fn end_of_input_at_confirmation_counts_as_declined() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(
        MockProvider::new().with_streamed_reply(write_file_reply("a.txt", "x")),
    );
    let mut chat = session(workspace.path(), provider, ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::default();

    assert_eq!(
        chat.run_turn(&mut terminal, "write a").expect("turn"),
        TurnOutcome::Aborted
    );
    assert!(!workspace.path().join("a.txt").exists());
}

#[test]
fn reading_a_missing_file_completes_with_not_found_result() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(
        MockProvider::new()
            .with_streamed_reply(invoke_reply("read_file", "<path>missing.txt</path>"))
            .with_completion_reply("That file does not exist yet."),
    );
    let mut chat = session(workspace.path(), provider, ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["yes"]);

    let outcome = chat.run_turn(&mut terminal, "show missing.txt").expect("turn");

    assert_eq!(outcome, TurnOutcome::ToolExecuted);
    let stored = &chat.store().session()[1].content;
    assert!(stored.contains("<stdout>\nFile not found: missing.txt\n</stdout>"));
    assert!(stored.ends_with("That file does not exist yet."));
}

#[test]
fn unknown_tool_keeps_the_original_message() {
    let workspace = tempdir().expect("temp workspace");
    let reply = invoke_reply("run_shell", "<command>touch x</command>");
    let provider = Arc::new(MockProvider::new().with_streamed_reply(reply.clone()));
    let mut chat = session(workspace.path(), provider.clone(), ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["y"]);

    let outcome = chat.run_turn(&mut terminal, "touch x").expect("turn");

    assert_eq!(outcome, TurnOutcome::Unrecognized);
    let truncated = reply
        .strip_suffix(INVOCATION_END)
        .expect("reply ends with the end marker");
    assert_eq!(chat.store().session()[1], Message::assistant(truncated));
    assert_eq!(fs::read_dir(workspace.path()).expect("workspace").count(), 0);
    assert_eq!(provider.requests().len(), 1);
}

#[test]
fn parameter_error_is_appended_as_a_suffix_without_continuation() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(
        MockProvider::new().with_streamed_reply(invoke_reply("write_files", "<files>[oops</files>")),
    );
    let mut chat = session(workspace.path(), provider.clone(), ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["y"]);

    let outcome = chat.run_turn(&mut terminal, "write files").expect("turn");

    assert_eq!(outcome, TurnOutcome::ToolFailed);
    let stored = &chat.store().session()[1].content;
    assert!(stored.contains(&format!("</invoke>\n{INVOCATION_END}\n\n[Tool call failed: invalid parameters for write_files")));
    assert_eq!(provider.requests().len(), 1);
    assert!(terminal.plain_output().contains("Tool call failed:"));
}

#[test]
fn streamed_markup_is_styled_and_reset() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(
        MockProvider::new().with_streamed_reply(write_file_reply("a.txt", "x")),
    );
    let mut chat = session(workspace.path(), provider, ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["n"]);

    chat.run_turn(&mut terminal, "write a").expect("turn");

    let output = terminal.output();
    let tool_style = output.find("\x1b[96m").expect("tool style applied");
    let marker = output.find(INVOCATION_START).expect("marker echoed");
    let reset = output.rfind("\x1b[0m").expect("style reset");
    assert!(tool_style < marker && marker < reset);
    assert_eq!(output.matches(INVOCATION_START).count(), 1);
}

/// Streams a scripted reply but fails every non-streaming call.
struct FailingContinuation {
    reply: Mutex<Option<String>>,
}

impl CompletionProvider for FailingContinuation {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: "failing".to_string(),
            model_id: "failing".to_string(),
        }
    }

    fn stream(
        &self,
        _req: &CompletionRequest,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<Completion, ProviderError> {
        let reply = self
            .reply
            .lock()
            .expect("reply lock")
            .take()
            .unwrap_or_default();
        on_text(&reply);
        Ok(Completion::new(
            reply,
            Some(StopReason::StopSequence(INVOCATION_END.to_string())),
        ))
    }

    fn complete(&self, _req: &CompletionRequest) -> Result<Completion, ProviderError> {
        Err(ProviderError::new("Messages API overloaded"))
    }
}

#[test]
fn failed_continuation_stores_the_tool_result_and_reports_the_error() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(FailingContinuation {
        reply: Mutex::new(Some(
            write_file_reply("a.txt", "x")
                .split(INVOCATION_END)
                .next()
                .unwrap_or_default()
                .to_string(),
        )),
    });
    let mut chat = session(workspace.path(), provider, ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["y"]);

    let error = chat
        .run_turn(&mut terminal, "write a")
        .expect_err("continuation failure surfaces");

    assert!(matches!(error, TurnError::Provider(_)));
    assert!(workspace.path().join("a.txt").exists());
    let stored = &chat.store().session()[1].content;
    assert!(stored.contains("<stdout>\nWrote a.txt (1 bytes)\n</stdout>"));
    assert!(stored.ends_with(STEERING_PHRASE));
}

#[test]
fn run_loop_handles_initial_query_exit_and_persistence() {
    let workspace = tempdir().expect("temp workspace");
    let history = workspace.path().join("memory.json");
    let provider = Arc::new(
        MockProvider::new()
            .with_streamed_reply("First answer.")
            .with_streamed_reply("Second answer."),
    );
    let store = ConversationStore::persistent(HistoryFile::new(&history, 24)).expect("store");
    let mut chat = session(workspace.path(), provider.clone(), store);
    let mut terminal = ScriptedTerminal::with_input(["follow up", "QUIT", "never read"]);

    chat.run(&mut terminal, Some("hello".to_string())).expect("run");

    assert_eq!(terminal.remaining_input(), 1);
    let output = terminal.output();
    assert!(output.starts_with("\x1b[94m> hello\x1b[0m\n"));
    assert!(output.ends_with("\x1b[0m"));

    let reloaded = ConversationStore::persistent(HistoryFile::new(&history, 24)).expect("reload");
    assert_eq!(
        reloaded.persisted(),
        &[
            Message::user("hello"),
            Message::assistant("First answer."),
            Message::user("follow up"),
            Message::assistant("Second answer."),
        ]
    );

    let requests = provider.requests();
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[1].messages[0], Message::user("hello"));
}

#[test]
fn end_of_input_ends_the_session_cleanly() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(MockProvider::new());
    let mut chat = session(workspace.path(), provider.clone(), ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::default();

    chat.run(&mut terminal, None).expect("run");

    assert!(provider.requests().is_empty());
    assert!(chat.store().session().is_empty());
    assert!(terminal.output().ends_with("\x1b[0m"));
}

#[test]
fn initial_query_is_sent_even_when_it_reads_like_an_exit_word() {
    let workspace = tempdir().expect("temp workspace");
    let provider = Arc::new(MockProvider::new().with_streamed_reply("Use :q to leave vim."));
    let mut chat = session(workspace.path(), provider.clone(), ConversationStore::in_memory(24));
    let mut terminal = ScriptedTerminal::with_input(["exit"]);

    chat.run(&mut terminal, Some("quit".to_string())).expect("run");

    assert_eq!(provider.requests().len(), 1);
    assert_eq!(
        chat.store().session(),
        &[
            Message::user("quit"),
            Message::assistant("Use :q to leave vim."),
        ]
    );
    assert_eq!(terminal.remaining_input(), 0);
}
