use chat_provider::Message;

use crate::error::HistoryStoreError;
use crate::file::{tail, HistoryFile};

/// Ordered, role-tagged message log for one process.
///
/// The window seen by the model is persisted history followed by this
/// session's messages, truncated from the front to the most recent `limit`.
/// Nothing older than `limit` messages is retained in memory.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    persisted: Vec<Message>,
    session: Vec<Message>,
    limit: usize,
    file: Option<HistoryFile>,
}

impl ConversationStore {
    /// Session-only store; nothing touches disk.
    #[must_use]
    pub fn in_memory(limit: usize) -> Self {
        Self {
            persisted: Vec::new(),
            session: Vec::new(),
            limit,
            file: None,
        }
    }

    /// Store backed by `file`, with persisted history loaded immediately.
    pub fn persistent(file: HistoryFile) -> Result<Self, HistoryStoreError> {
        let mut store = Self {
            persisted: Vec::new(),
            session: Vec::new(),
            limit: file.limit(),
            file: Some(file),
        };
        store.load()?;
        Ok(store)
    }

    pub fn append(&mut self, message: Message) {
        self.session.push(message);
        self.trim_to_limit();
    }

    /// Most recent `limit` messages of persisted ++ session.
    #[must_use]
    pub fn window(&self, limit: usize) -> Vec<Message> {
        let total = self.persisted.len() + self.session.len();
        let skip = total.saturating_sub(limit);
        self.persisted
            .iter()
            .chain(self.session.iter())
            .skip(skip)
            .cloned()
            .collect()
    }

    /// Replaces the persisted prefix with the file's current content.
    pub fn load(&mut self) -> Result<usize, HistoryStoreError> {
        let Some(file) = &self.file else {
            return Ok(0);
        };
        let loaded = file.load()?;
        self.persisted = tail(&loaded, self.limit).to_vec();
        self.trim_to_limit();
        tracing::debug!(count = self.persisted.len(), "loaded persisted history");
        Ok(self.persisted.len())
    }

    /// Rewrites the backing file with the current window. No-op without a file.
    pub fn save(&self) -> Result<(), HistoryStoreError> {
        match &self.file {
            Some(file) => file.save(&self.window(self.limit)),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.file.is_some()
    }

    #[must_use]
    pub fn persisted(&self) -> &[Message] {
        &self.persisted
    }

    #[must_use]
    pub fn session(&self) -> &[Message] {
        &self.session
    }

    fn trim_to_limit(&mut self) {
        let excess = (self.persisted.len() + self.session.len()).saturating_sub(self.limit);
        let from_persisted = excess.min(self.persisted.len());
        self.persisted.drain(..from_persisted);
        self.session.drain(..excess - from_persisted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_truncates_from_the_front_across_both_segments() {
        let mut store = ConversationStore::in_memory(24);
        store.persisted = vec![Message::user("p1"), Message::assistant("p2")];
        store.append(Message::user("s1"));
        store.append(Message::assistant("s2"));

        assert_eq!(
            store.window(3),
            vec![
                Message::assistant("p2"),
                Message::user("s1"),
                Message::assistant("s2"),
            ]
        );
        assert_eq!(store.window(10).len(), 4);
        assert!(store.window(0).is_empty());
    }

    #[test]
    fn in_memory_store_saves_nothing() {
        let mut store = ConversationStore::in_memory(4);
        store.append(Message::user("hello"));
        store.save().expect("in-memory save is a no-op");
        assert_eq!(store.load().expect("in-memory load is a no-op"), 0);
        assert!(!store.is_persistent());
        assert_eq!(store.session(), &[Message::user("hello")]);
    }

    #[test]
    fn memory_is_bounded_by_the_limit() {
        let mut store = ConversationStore::in_memory(3);
        store.persisted = vec![Message::user("p1"), Message::assistant("p2")];
        store.append(Message::user("s1"));
        assert_eq!(store.persisted().len(), 2);

        store.append(Message::assistant("s2"));
        store.append(Message::user("s3"));
        assert!(store.persisted().is_empty());
        assert_eq!(
            store.session(),
            &[
                Message::user("s1"),
                Message::assistant("s2"),
                Message::user("s3"),
            ]
        );

        for index in 0..50 {
            store.append(Message::user(format!("turn {index}")));
        }
        assert_eq!(store.session().len(), 3);
        assert_eq!(store.window(24).len(), 3);
    }
}
