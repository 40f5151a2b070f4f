//! Transport-only Anthropic Messages API client primitives.
//!
//! This crate owns request building, SSE framing, event normalization, retry,
//! and error mapping for the Messages endpoint. It contains no conversation
//! state and no terminal coupling.
//!
//! Stop sequences are passed through unchanged; when the provider halts on one,
//! the stream reports it through [`AnthropicStreamEvent::MessageDelta`] and the
//! aggregated [`StreamTerminal::stop_sequence`].

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::AnthropicApiClient;
pub use client::{StreamResult, StreamTerminal};
pub use config::AnthropicApiConfig;
pub use error::AnthropicApiError;
pub use events::{AnthropicStopReason, AnthropicStreamEvent};
pub use payload::{ApiMessage, MessagesRequest, MessagesResponse, ResponseContentBlock};
pub use sse::SseStreamParser;
pub use url::normalize_messages_url;
