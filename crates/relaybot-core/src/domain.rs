use std::fmt;

/// Chat identifier as stored and addressed by the relay.
///
/// Opaque string: Telegram accepts both numeric ids (`-1001234567890`) and
/// public channel handles (`@mychannel`), and destinations are configured by
/// admins as free text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Telegram message id (numeric, unique per chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stable reference to a message in a chat.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(chat_id: impl Into<ChatId>, message_id: i32) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id: MessageId(message_id),
        }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

/// Normalize a user handle: trim whitespace and strip a single leading `@`.
///
/// Returns `None` when nothing is left.
pub fn normalize_identity(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    if bare.is_empty() {
        None
    } else {
        Some(bare.to_string())
    }
}

/// The author of an inbound message or command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub user_id: i64,
    pub username: Option<String>,
}

impl Sender {
    pub fn new(user_id: i64, username: Option<&str>) -> Self {
        Self {
            user_id,
            username: username.and_then(normalize_identity),
        }
    }

    /// Identities this sender may be listed under, most specific first.
    pub fn identities(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(2);
        if let Some(u) = &self.username {
            out.push(u.clone());
        }
        out.push(self.user_id.to_string());
        out
    }

    /// Label used in logs and audit events.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(u) => format!("@{u}"),
            None => self.user_id.to_string(),
        }
    }
}
