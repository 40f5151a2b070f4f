use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use chat_agent::config::{Cli, Settings};
use chat_agent::context::SessionContext;
use chat_agent::prompt::build_system_prompt;
use chat_agent::providers::provider_for_settings;
use chat_agent::{ChatSession, SessionOptions, ToolRegistry, WorkspaceTools};
use clap::Parser;
use history_store::{ConversationStore, HistoryFile};
use termchat::{OutputGate, ProcessTerminal, Style, TerminalCmd};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env(Cli::parse());
    init_tracing(&settings.log_filter);

    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    let tools = WorkspaceTools::new(&cwd).map_err(|error| anyhow!(error))?;
    let mut terminal = ProcessTerminal::new();
    let mut output = OutputGate::new();

    if settings.show_tree {
        output.push(TerminalCmd::text(tools.tree_listing(tools.workspace_root())));
        output.push(TerminalCmd::Newline);
        output.flush(&mut terminal);
        return Ok(());
    }

    let provider = provider_for_settings(&settings).map_err(|error| anyhow!("{error}"))?;
    let profile = provider.profile();
    tracing::info!(provider = %profile.provider_id, model = %profile.model_id, "provider ready");

    let store = if settings.memory {
        let file = HistoryFile::new(&settings.history_file, settings.history_limit);
        match ConversationStore::persistent(file) {
            Ok(store) => store,
            Err(error) => {
                tracing::warn!(%error, "history unavailable, continuing without persistence");
                output.extend(TerminalCmd::styled(
                    Style::Warning,
                    format!("Warning: {error}. History will not be saved this session."),
                ));
                output.push(TerminalCmd::Newline);
                output.flush(&mut terminal);
                ConversationStore::in_memory(settings.history_limit)
            }
        }
    } else {
        ConversationStore::in_memory(settings.history_limit)
    };

    let context = SessionContext::capture(&cwd, |key| std::env::var(key).ok());
    let system_prompt =
        build_system_prompt(&context, store.is_persistent(), &ToolRegistry::builtin());
    let options = SessionOptions::new(system_prompt)
        .with_max_tokens(settings.max_tokens, settings.continuation_max_tokens);

    #[cfg(unix)]
    let _signals = termchat::install_signal_handlers(|| {
        let mut terminal = ProcessTerminal::new();
        let mut output = OutputGate::new();
        output.push(TerminalCmd::ClearLine);
        output.push(TerminalCmd::Style(Style::Reset));
        output.flush(&mut terminal);
        std::process::exit(0);
    })
    .context("failed to install signal handlers")?;

    let mut session = ChatSession::new(provider, Box::new(tools), store, options);
    session.run(&mut terminal, settings.initial_query.clone())?;
    Ok(())
}

/// Log to `<data dir>/termchat/termchat.log`; without a writable file, log nothing.
fn init_tracing(filter: &str) {
    let Some(dir) = dirs::data_local_dir().map(|dir| dir.join("termchat")) else {
        return;
    };
    fs::create_dir_all(&dir).ok();
    let Some(file) = File::create(dir.join("termchat.log")).ok() else {
        return;
    };

    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}
