//! Deterministic mock implementation of the `chat_provider` contract.
//!
//! Replies are scripted up front: one queue feeds streamed calls and another
//! feeds non-streaming calls. Stop sequences are honored the way a hosted
//! provider honors them, so tool-call turns can be exercised offline.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chat_provider::{
    Completion, CompletionProvider, CompletionRequest, ProviderError, ProviderProfile, Role,
    StopReason,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Oldest requests are dropped past this many.
pub const MAX_RECORDED_REQUESTS: usize = 256;

/// Deterministic mock provider used by tests and offline runs.
#[derive(Debug, Default)]
pub struct MockProvider {
    streamed: Mutex<VecDeque<String>>,
    completions: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    token_delay: Duration,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the full text of the next streamed reply.
    #[must_use]
    pub fn with_streamed_reply(self, text: impl Into<String>) -> Self {
        lock_unpoisoned(&self.streamed).push_back(text.into());
        self
    }

    /// Queues the text of the next non-streaming reply.
    #[must_use]
    pub fn with_completion_reply(self, text: impl Into<String>) -> Self {
        lock_unpoisoned(&self.completions).push_back(text.into());
        self
    }

    /// Pause between emitted tokens, for offline demos.
    #[must_use]
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// The most recent requests, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    fn record(&self, req: &CompletionRequest) {
        let mut requests = lock_unpoisoned(&self.requests);
        requests.push(req.clone());
        let excess = requests.len().saturating_sub(MAX_RECORDED_REQUESTS);
        requests.drain(..excess);
    }

    fn fallback_reply(req: &CompletionRequest) -> String {
        let last_user = req
            .messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.trim())
            .unwrap_or("");
        format!("Mock reply to: {last_user}")
    }
}

impl CompletionProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "mock".to_string(),
        }
    }

    fn stream(
        &self,
        req: &CompletionRequest,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<Completion, ProviderError> {
        self.record(req);
        let scripted = lock_unpoisoned(&self.streamed).pop_front();
        let full = scripted.unwrap_or_else(|| Self::fallback_reply(req));
        let (text, stop_reason) = apply_stop_sequences(&full, &req.stop_sequences);

        let mut pending_token = String::new();
        for ch in text.chars() {
            pending_token.push(ch);
            if matches!(ch, ' ' | '\n') {
                on_text(&std::mem::take(&mut pending_token));
                self.pause();
            }
        }
        if !pending_token.is_empty() {
            on_text(&pending_token);
        }

        Ok(Completion::new(text, Some(stop_reason)))
    }

    fn complete(&self, req: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.record(req);
        let scripted = lock_unpoisoned(&self.completions).pop_front();
        let full = scripted.unwrap_or_else(|| "Mock continuation.".to_string());
        let (text, stop_reason) = apply_stop_sequences(&full, &req.stop_sequences);
        Ok(Completion::new(text, Some(stop_reason)))
    }
}

impl MockProvider {
    fn pause(&self) {
        if !self.token_delay.is_zero() {
            thread::sleep(self.token_delay);
        }
    }
}

/// Truncate at the earliest stop sequence, which is not included in the text.
fn apply_stop_sequences(full: &str, stop_sequences: &[String]) -> (String, StopReason) {
    let earliest = stop_sequences
        .iter()
        .filter(|sequence| !sequence.is_empty())
        .filter_map(|sequence| full.find(sequence.as_str()).map(|index| (index, sequence)))
        .min_by_key(|(index, _)| *index);

    match earliest {
        Some((index, sequence)) => (
            full[..index].to_string(),
            StopReason::StopSequence(sequence.clone()),
        ),
        None => (full.to_string(), StopReason::EndTurn),
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
