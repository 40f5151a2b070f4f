use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum AnthropicApiError {
    MissingApiKey,
    InvalidHeader(String),
    InvalidRequestPayload(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    Overloaded {
        message: String,
    },
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    StreamFailed {
        error_type: Option<String>,
        message: String,
    },
    Unknown(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

impl ErrorPayloadFields {
    pub fn overloaded_message(&self, status: StatusCode) -> Option<String> {
        let error_type = self
            .type_
            .as_deref()
            .and_then(non_empty_string)
            .unwrap_or("");
        if !matches_overloaded(error_type, status) {
            return None;
        }

        let detail = self
            .message
            .as_deref()
            .and_then(non_empty_string)
            .map(|value| format!(" ({value})"))
            .unwrap_or_default();

        Some(format!("The API is temporarily overloaded{detail}. Try again shortly."))
    }

    pub fn message_or_fallback(&self) -> Option<String> {
        let explicit = self.message.as_deref().and_then(non_empty_string)?;
        match self.type_.as_deref().and_then(non_empty_string) {
            Some(error_type) => Some(format!("{error_type}: {explicit}")),
            None => Some(explicit.to_owned()),
        }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = &self.value {
            let message = value.message.as_deref().unwrap_or("unknown error");
            write!(f, "{message}")
        } else {
            write!(f, "unknown error")
        }
    }
}

impl fmt::Display for AnthropicApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::InvalidRequestPayload(message) => write!(f, "invalid request payload: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::Overloaded { message } => write!(f, "{message}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                write!(f, "retry exhausted after max attempts (status: {status}, last_error: {last_error:?})")
            }
            Self::StreamFailed {
                error_type,
                message,
            } => match error_type {
                Some(error_type) if !error_type.trim().is_empty() => {
                    write!(f, "stream failed ({error_type}): {message}")
                }
                _ => write!(f, "stream failed: {message}"),
            },
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for AnthropicApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AnthropicApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for AnthropicApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let parsed = match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload,
        Err(_) => return status_fallback(status, body),
    };

    if let Some(error) = parsed.value {
        if let Some(message) = error.overloaded_message(status) {
            return message;
        }
        if let Some(message) = error.message_or_fallback() {
            return message;
        }
    }

    status_fallback(status, body)
}

fn status_fallback(status: StatusCode, body: &str) -> String {
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn matches_overloaded(error_type: &str, status: StatusCode) -> bool {
    status.as_u16() == 529 || error_type.eq_ignore_ascii_case("overloaded_error")
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
