use chat_provider::ProviderError;
use history_store::HistoryStoreError;
use thiserror::Error;

/// Per-invocation failure. Never fatal to the turn loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("malformed tool invocation: {0}")]
    MalformedInvocation(String),

    #[error("invalid parameters for {tool}: {message}")]
    ToolParameterError { tool: String, message: String },

    #[error("{tool} failed: {message}")]
    ToolExecution { tool: String, message: String },
}

impl ToolError {
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInvocation(message.into())
    }

    #[must_use]
    pub fn parameter(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolParameterError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Failure that ends one turn early. The loop reports it and keeps going.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    History(#[from] HistoryStoreError),

    #[error("terminal I/O failed: {0}")]
    Terminal(#[from] std::io::Error),
}
