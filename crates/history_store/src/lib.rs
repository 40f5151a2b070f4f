mod error;
mod file;
mod store;

pub use error::HistoryStoreError;
pub use file::{HistoryFile, DEFAULT_HISTORY_FILE, DEFAULT_HISTORY_LIMIT};
pub use store::ConversationStore;
