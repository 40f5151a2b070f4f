use serde::{Deserialize, Serialize};

/// Canonical stop reason reported by the Messages API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnthropicStopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

impl AnthropicStopReason {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "end_turn" => Self::EndTurn,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "tool_use" => Self::ToolUse,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::StopSequence => "stop_sequence",
            Self::ToolUse => "tool_use",
        }
    }
}

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { id: Option<String> },
    /// Normalized `content_block_delta` carrying a `text_delta`.
    #[serde(rename = "content_block_delta")]
    TextDelta { index: usize, text: String },
    #[serde(rename = "message_delta")]
    MessageDelta {
        stop_reason: Option<AnthropicStopReason>,
        stop_sequence: Option<String>,
    },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "error")]
    Error {
        error_type: Option<String>,
        message: Option<String>,
    },
}
