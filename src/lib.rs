//! Terminal surface for the termchat client.
//!
//! Invariant: single output gate — only `core::output::OutputGate::flush(..)` writes to the
//! terminal.
//!
//! # Public API Overview
//! - Name styling with the closed [`Style`] token set instead of raw ANSI codes.
//! - Queue typed [`TerminalCmd`]s and flush them through an [`OutputGate`].
//! - Read prompt lines and write streamed text through the [`Terminal`] trait; the
//!   process-backed implementation is [`ProcessTerminal`].
//! - Restore styling on SIGINT/SIGTERM with [`install_signal_handlers`].

pub mod core;
pub mod platform;

/// Style tokens and typed output commands.
pub use crate::core::output::{OutputGate, TerminalCmd};
pub use crate::core::style::Style;

/// Terminal interfaces and process-backed implementation.
pub use crate::core::terminal::Terminal;
pub use crate::platform::process_terminal::ProcessTerminal;
#[cfg(unix)]
pub use crate::platform::process_terminal::{install_signal_handlers, SignalHookGuard};
