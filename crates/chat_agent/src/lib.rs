//! Tool-call protocol engine and turn loop for the `termchat` client.
//!
//! A streamed reply is echoed through [`detector::StreamingDetector`]; when it
//! carries `<function_calls>` markup the user confirms, [`dispatch::dispatch`]
//! runs the first invocation against [`tools::WorkspaceTools`], and
//! [`continuation`] asks the provider for a short wrap-up that is stored with
//! the tool result as one assistant message.

pub mod app;
pub mod config;
pub mod context;
pub mod continuation;
pub mod detector;
pub mod dispatch;
pub mod error;
pub mod markup;
pub mod parser;
pub mod prompt;
pub mod providers;
pub mod tags;
pub mod tools;

pub use app::{ChatSession, SessionOptions, TurnOutcome};
pub use config::{Cli, Settings};
pub use context::SessionContext;
pub use dispatch::{dispatch, DispatchOutcome};
pub use error::{ToolError, TurnError};
pub use parser::ToolInvocation;
pub use tools::{ToolCall, ToolExecutor, ToolOutput, ToolRegistry, WorkspaceTools};
