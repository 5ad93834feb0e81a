use crate::domain::ChatId;

/// Core error type for the relay bot.
///
/// Expected domain outcomes (duplicate insert, nothing to remove) are not errors;
/// they are reported through `store::Insert` / `store::Removal`. What remains here
/// is infrastructure failure that callers either log (delivery) or propagate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("delivery to {chat_id} failed: {reason}")]
    Delivery { chat_id: ChatId, reason: String },

    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn delivery(chat_id: &ChatId, reason: impl Into<String>) -> Self {
        Self::Delivery {
            chat_id: chat_id.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
