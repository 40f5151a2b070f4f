use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};

use crate::config::AnthropicApiConfig;
use crate::error::{parse_error_message, AnthropicApiError};
use crate::events::{AnthropicStopReason, AnthropicStreamEvent};
use crate::headers::build_headers;
use crate::payload::{MessagesRequest, MessagesResponse};
use crate::retry::is_retryable_http_error;
use crate::retry::{retry_delay_ms, MAX_RETRIES};
use crate::sse::SseStreamParser;
use crate::url::normalize_messages_url;

#[derive(Debug)]
pub struct AnthropicApiClient {
    http: Client,
    config: AnthropicApiConfig,
}

/// Terminal state accumulated while draining a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamTerminal {
    pub stop_reason: Option<AnthropicStopReason>,
    pub stop_sequence: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<AnthropicStreamEvent>,
    pub terminal: StreamTerminal,
}

impl StreamResult {
    /// Concatenated text deltas in stream order.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                AnthropicStreamEvent::TextDelta { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl AnthropicApiClient {
    pub fn new(config: AnthropicApiConfig) -> Result<Self, AnthropicApiError> {
        if config.api_key.trim().is_empty() {
            return Err(AnthropicApiError::MissingApiKey);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(AnthropicApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AnthropicApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_messages_url(&self.config.base_url)
    }

    pub fn build_headers(&self, streaming: bool) -> Result<HeaderMap, AnthropicApiError> {
        let headers = build_headers(&self.config, streaming)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    AnthropicApiError::InvalidHeader(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    AnthropicApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &MessagesRequest,
    ) -> Result<reqwest::RequestBuilder, AnthropicApiError> {
        validate_request_payload_shape(request)?;

        let headers = self.build_headers(request.stream)?;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(request))
    }

    pub async fn send_with_retry(
        &self,
        request: &MessagesRequest,
    ) -> Result<Response, AnthropicApiError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.build_request(request)?.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    last_status = Some(status);
                    let body = response.text().await.unwrap_or_else(|_| {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    });
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tracing::warn!(%status, attempt, "retrying Messages API request");
                        tokio::time::sleep(retry_delay_ms(attempt)).await;
                        continue;
                    }

                    if status.as_u16() == 529 {
                        return Err(AnthropicApiError::Overloaded { message });
                    }
                    return Err(AnthropicApiError::Status(status, message));
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt < MAX_RETRIES {
                        tracing::warn!(%error, attempt, "retrying Messages API request after transport error");
                        tokio::time::sleep(retry_delay_ms(attempt)).await;
                        continue;
                    }
                    return Err(AnthropicApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(AnthropicApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    pub async fn stream_with_handler<F>(
        &self,
        request: &MessagesRequest,
        mut on_event: F,
    ) -> Result<StreamTerminal, AnthropicApiError>
    where
        F: FnMut(AnthropicStreamEvent),
    {
        let request = request.clone().with_stream(true);
        let response = self.send_with_retry(&request).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();
        let mut terminal = StreamTerminal::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(AnthropicApiError::from)?;
            for event in parser.feed(&chunk) {
                process_stream_event(event, &mut terminal, &mut on_event)?;
            }
        }

        Ok(terminal)
    }

    pub async fn stream(
        &self,
        request: &MessagesRequest,
    ) -> Result<StreamResult, AnthropicApiError> {
        let mut events = Vec::new();
        let terminal = self
            .stream_with_handler(request, |event| {
                events.push(event);
            })
            .await?;

        Ok(StreamResult { events, terminal })
    }

    /// Issue a non-streaming request and decode the full response body.
    pub async fn complete(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicApiError> {
        let request = request.clone().with_stream(false);
        let response = self.send_with_retry(&request).await?;
        let body = response.text().await?;
        serde_json::from_str::<MessagesResponse>(&body).map_err(AnthropicApiError::from)
    }
}

fn validate_request_payload_shape(request: &MessagesRequest) -> Result<(), AnthropicApiError> {
    if request.messages.is_empty() {
        return Err(AnthropicApiError::InvalidRequestPayload(
            "'messages' must contain at least one message".to_string(),
        ));
    }
    if request.max_tokens == 0 {
        return Err(AnthropicApiError::InvalidRequestPayload(
            "'max_tokens' must be greater than zero".to_string(),
        ));
    }
    if let Some(message) = request
        .messages
        .iter()
        .find(|message| message.role != "user" && message.role != "assistant")
    {
        return Err(AnthropicApiError::InvalidRequestPayload(format!(
            "unsupported message role '{}'",
            message.role
        )));
    }

    Ok(())
}

fn process_stream_event<F>(
    event: AnthropicStreamEvent,
    terminal: &mut StreamTerminal,
    on_event: &mut F,
) -> Result<(), AnthropicApiError>
where
    F: FnMut(AnthropicStreamEvent),
{
    match &event {
        AnthropicStreamEvent::Error {
            error_type,
            message,
        } => {
            return Err(AnthropicApiError::StreamFailed {
                error_type: error_type.clone(),
                message: message
                    .clone()
                    .or_else(|| error_type.clone())
                    .unwrap_or_else(|| "Messages API stream failed".to_owned()),
            });
        }
        AnthropicStreamEvent::MessageDelta {
            stop_reason,
            stop_sequence,
        } => {
            if stop_reason.is_some() {
                terminal.stop_reason = *stop_reason;
            }
            if stop_sequence.is_some() {
                terminal.stop_sequence = stop_sequence.clone();
            }
        }
        AnthropicStreamEvent::MessageStop => terminal.completed = true,
        _ => {}
    }

    on_event(event);
    Ok(())
}
