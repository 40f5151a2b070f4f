//! Minimal provider-agnostic contract for one completion call.
//!
//! This crate defines the message history shape shared by the conversation
//! store and the providers, plus the streaming and non-streaming completion
//! entry points. Transport details and protocol payloads live elsewhere.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned while constructing/configuring a provider before any call starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure of a single completion call after the provider was constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderError {}

impl From<String> for ProviderError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Speaker of one conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged conversation entry. Identity is positional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Input required for one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    /// Literal substrings at which the provider halts generation without emitting them.
    pub stop_sequences: Vec<String>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(system: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            messages,
            max_tokens,
            stop_sequences: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_stop_sequence(mut self, stop_sequence: impl Into<String>) -> Self {
        self.stop_sequences.push(stop_sequence.into());
        self
    }
}

/// Why generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    /// Generation halted on the carried stop sequence, which is not part of the text.
    StopSequence(String),
    Other(String),
}

/// Final text of one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub stop_reason: Option<StopReason>,
}

impl Completion {
    #[must_use]
    pub fn new(text: impl Into<String>, stop_reason: Option<StopReason>) -> Self {
        Self {
            text: text.into(),
            stop_reason,
        }
    }

    #[must_use]
    pub fn stopped_on(&self, sequence: &str) -> bool {
        matches!(&self.stop_reason, Some(StopReason::StopSequence(seq)) if seq == sequence)
    }
}

/// Immutable metadata describing a completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for executing completion calls.
pub trait CompletionProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Executes a streamed completion, invoking `on_text` for each text chunk in
    /// provider order, and returns the full accumulated text.
    fn stream(
        &self,
        req: &CompletionRequest,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<Completion, ProviderError>;

    /// Executes a single non-streaming completion.
    fn complete(&self, req: &CompletionRequest) -> Result<Completion, ProviderError>;
}
