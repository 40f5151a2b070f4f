use std::sync::Arc;
use std::time::Duration;

use chat_provider::{CompletionProvider, ProviderInitError};
use chat_provider_anthropic::{AnthropicProvider, AnthropicProviderConfig, ANTHROPIC_PROVIDER_ID};
use chat_provider_mock::{MockProvider, MOCK_PROVIDER_ID};

use crate::config::{Settings, API_KEY_ENV_VAR};

const MOCK_TOKEN_DELAY: Duration = Duration::from_millis(20);

/// A missing credential is the one startup failure that ends the process.
pub fn provider_for_settings(
    settings: &Settings,
) -> Result<Arc<dyn CompletionProvider>, ProviderInitError> {
    match settings.provider_id.as_str() {
        ANTHROPIC_PROVIDER_ID => {
            let api_key = settings.api_key.clone().ok_or_else(|| {
                ProviderInitError::new(format!(
                    "{API_KEY_ENV_VAR} is not set. Export it or pass --provider mock."
                ))
            })?;
            let mut config = AnthropicProviderConfig::new(api_key, settings.model_id.clone());
            if let Some(base_url) = &settings.base_url {
                config = config.with_base_url(base_url.clone());
            }
            Ok(Arc::new(AnthropicProvider::new(config)?))
        }
        MOCK_PROVIDER_ID => Ok(Arc::new(MockProvider::new().with_token_delay(MOCK_TOKEN_DELAY))),
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {ANTHROPIC_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        ))),
    }
}
