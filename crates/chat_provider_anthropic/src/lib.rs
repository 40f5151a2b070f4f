//! Anthropic Messages API-backed implementation of the `chat_provider` contract.
//!
//! The transport is async; the turn loop is not. Each call drives the transport
//! to completion on a current-thread runtime and forwards text deltas to the
//! caller as they arrive.

use std::sync::Arc;
use std::time::Duration;

use anthropic_api::{
    AnthropicApiClient, AnthropicApiConfig, AnthropicApiError, AnthropicStopReason,
    AnthropicStreamEvent, ApiMessage, MessagesRequest, MessagesResponse, StreamTerminal,
};
use chat_provider::{
    Completion, CompletionProvider, CompletionRequest, ProviderError, ProviderInitError,
    ProviderProfile, StopReason,
};

/// Stable provider identifier used by startup selection.
pub const ANTHROPIC_PROVIDER_ID: &str = "anthropic";

pub const DEFAULT_MODEL_ID: &str = "claude-3-sonnet-20240229";

/// Runtime configuration for the Anthropic provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnthropicProviderConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl AnthropicProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> Result<AnthropicApiConfig, ProviderInitError> {
        let mut config = AnthropicApiConfig::new(self.api_key);

        if let Some(base_url) = self.base_url.filter(|value| !value.trim().is_empty()) {
            url::Url::parse(base_url.trim()).map_err(|error| {
                ProviderInitError::new(format!("Invalid Anthropic base URL '{base_url}': {error}"))
            })?;
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        Ok(config)
    }
}

trait StreamClient: Send + Sync {
    fn stream(
        &self,
        request: &MessagesRequest,
        on_event: &mut dyn FnMut(AnthropicStreamEvent),
    ) -> Result<StreamTerminal, AnthropicApiError>;

    fn complete(&self, request: &MessagesRequest) -> Result<MessagesResponse, AnthropicApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: AnthropicApiClient,
}

impl DefaultStreamClient {
    fn runtime() -> Result<tokio::runtime::Runtime, AnthropicApiError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                AnthropicApiError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })
    }
}

impl StreamClient for DefaultStreamClient {
    fn stream(
        &self,
        request: &MessagesRequest,
        on_event: &mut dyn FnMut(AnthropicStreamEvent),
    ) -> Result<StreamTerminal, AnthropicApiError> {
        Self::runtime()?.block_on(self.client.stream_with_handler(request, on_event))
    }

    fn complete(&self, request: &MessagesRequest) -> Result<MessagesResponse, AnthropicApiError> {
        Self::runtime()?.block_on(self.client.complete(request))
    }
}

/// `CompletionProvider` adapter backed by `anthropic_api` transport primitives.
pub struct AnthropicProvider {
    model_id: String,
    stream_client: Arc<dyn StreamClient>,
}

impl AnthropicProvider {
    /// Creates a provider using real Messages API transport.
    pub fn new(config: AnthropicProviderConfig) -> Result<Self, ProviderInitError> {
        let model_id = sanitize_model_id(&config.model_id);
        let api_config = config.into_api_config()?;
        let stream_client = Arc::new(DefaultStreamClient {
            client: AnthropicApiClient::new(api_config).map_err(map_init_error)?,
        });

        Ok(Self {
            model_id,
            stream_client,
        })
    }

    fn build_request(&self, req: &CompletionRequest) -> MessagesRequest {
        let messages = req
            .messages
            .iter()
            .map(|message| ApiMessage::new(message.role.as_str(), message.content.clone()))
            .collect();
        let system = Some(req.system.clone()).filter(|system| !system.trim().is_empty());

        MessagesRequest::new(self.model_id.clone(), messages, system, req.max_tokens)
            .with_stop_sequences(req.stop_sequences.clone())
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(model_id: &str, stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            model_id: sanitize_model_id(model_id),
            stream_client,
        }
    }
}

impl CompletionProvider for AnthropicProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: ANTHROPIC_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn stream(
        &self,
        req: &CompletionRequest,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<Completion, ProviderError> {
        let request = self.build_request(req).with_stream(true);
        let mut text = String::new();

        let terminal = self
            .stream_client
            .stream(&request, &mut |event| {
                if let AnthropicStreamEvent::TextDelta { text: delta, .. } = event {
                    if !delta.is_empty() {
                        on_text(&delta);
                        text.push_str(&delta);
                    }
                }
            })
            .map_err(map_call_error)?;

        if !terminal.completed {
            tracing::warn!(
                chars = text.len(),
                "Messages API stream ended without message_stop"
            );
            return Err(ProviderError::new(
                "Messages API stream ended before the response completed",
            ));
        }

        let stop_reason = map_stop_reason(
            terminal.stop_reason,
            terminal.stop_sequence,
            &request.stop_sequences,
        );
        Ok(Completion::new(text, stop_reason))
    }

    fn complete(&self, req: &CompletionRequest) -> Result<Completion, ProviderError> {
        let request = self.build_request(req).with_stream(false);
        let response = self
            .stream_client
            .complete(&request)
            .map_err(map_call_error)?;

        let stop_reason = map_stop_reason(
            response
                .stop_reason
                .as_deref()
                .and_then(AnthropicStopReason::parse),
            response.stop_sequence.clone(),
            &request.stop_sequences,
        );
        Ok(Completion::new(response.text(), stop_reason))
    }
}

fn map_stop_reason(
    reason: Option<AnthropicStopReason>,
    sequence: Option<String>,
    requested: &[String],
) -> Option<StopReason> {
    Some(match reason? {
        AnthropicStopReason::EndTurn => StopReason::EndTurn,
        AnthropicStopReason::MaxTokens => StopReason::MaxTokens,
        AnthropicStopReason::StopSequence => StopReason::StopSequence(
            sequence
                .or_else(|| requested.first().cloned())
                .unwrap_or_default(),
        ),
        other => StopReason::Other(other.as_str().to_string()),
    })
}

fn sanitize_model_id(model_id: &str) -> String {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_init_error(error: AnthropicApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize anthropic provider: {error}"))
}

fn map_call_error(error: AnthropicApiError) -> ProviderError {
    tracing::warn!(%error, "Messages API request failed");
    ProviderError::new(format!("Anthropic API request failed: {error}"))
}
