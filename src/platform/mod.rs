//! Platform-specific terminal integrations.

pub mod process_terminal;

pub use process_terminal::ProcessTerminal;
#[cfg(unix)]
pub use process_terminal::{install_signal_handlers, SignalHookGuard};
