//! Command line and environment settings, resolved once at startup.

use std::path::PathBuf;

use chat_provider_anthropic::{ANTHROPIC_PROVIDER_ID, DEFAULT_MODEL_ID};
use chat_provider_mock::MOCK_PROVIDER_ID;
use clap::Parser;
use history_store::{DEFAULT_HISTORY_FILE, DEFAULT_HISTORY_LIMIT};

use crate::continuation::DEFAULT_CONTINUATION_MAX_TOKENS;

pub const API_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";
pub const BASE_URL_ENV_VAR: &str = "ANTHROPIC_BASE_URL";
pub const MODEL_ENV_VAR: &str = "TERMCHAT_MODEL";
pub const PROVIDER_ENV_VAR: &str = "TERMCHAT_PROVIDER";
pub const LOG_ENV_VAR: &str = "TERMCHAT_LOG";

pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "termchat")]
#[command(about = "Chat with an LLM from the terminal", long_about = None)]
pub struct Cli {
    /// Initial query, run as the first turn.
    #[arg(value_name = "QUERY", trailing_var_arg = true)]
    pub query: Vec<String>,
    /// Persist conversation history between sessions.
    #[arg(short = 'm', long, default_value_t = false)]
    pub memory: bool,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    #[arg(long)]
    pub history_file: Option<PathBuf>,
    #[arg(long)]
    pub history_limit: Option<usize>,
    /// `anthropic` or `mock`.
    #[arg(long)]
    pub provider: Option<String>,
    /// Print the workspace tree and exit.
    #[arg(long, default_value_t = false)]
    pub tree: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub provider_id: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub continuation_max_tokens: u32,
    pub memory: bool,
    pub history_file: PathBuf,
    pub history_limit: usize,
    pub initial_query: Option<String>,
    pub show_tree: bool,
    pub log_filter: String,
}

impl Settings {
    /// Flags win over environment values, which win over defaults.
    pub fn resolve<F>(cli: Cli, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let initial_query = Some(cli.query.join(" "))
            .map(|query| query.trim().to_string())
            .filter(|query| !query.is_empty());

        Self {
            provider_id: non_blank(cli.provider)
                .or_else(|| env(PROVIDER_ENV_VAR))
                .unwrap_or_else(|| ANTHROPIC_PROVIDER_ID.to_string()),
            model_id: non_blank(cli.model)
                .or_else(|| env(MODEL_ENV_VAR))
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            api_key: env(API_KEY_ENV_VAR),
            base_url: env(BASE_URL_ENV_VAR),
            max_tokens: cli.max_tokens.filter(|tokens| *tokens > 0).unwrap_or(DEFAULT_MAX_TOKENS),
            continuation_max_tokens: DEFAULT_CONTINUATION_MAX_TOKENS,
            memory: cli.memory,
            history_file: cli
                .history_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE)),
            history_limit: cli
                .history_limit
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_HISTORY_LIMIT),
            initial_query,
            show_tree: cli.tree,
            log_filter: env(LOG_ENV_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    pub fn from_env(cli: Cli) -> Self {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    pub fn uses_mock_provider(&self) -> bool {
        self.provider_id == MOCK_PROVIDER_ID
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
