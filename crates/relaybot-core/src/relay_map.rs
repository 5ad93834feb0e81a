use crate::{
    domain::{ChatId, MessageId, MessageRef},
    store::{classify_delete, classify_insert, Insert, Removal, Store},
    Result,
};

/// One edge from an original message to one relayed copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayedMessageLink {
    pub original: MessageRef,
    pub relayed: MessageRef,
}

/// Persistent mapping from relayed copies back to their originals.
///
/// Many-to-one: an original has one link per destination that received it, and
/// a relayed copy belongs to at most one original (UNIQUE on the relayed key).
#[derive(Clone, Debug)]
pub struct RelayMap {
    store: Store,
}

impl RelayMap {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn add(&self, original: &MessageRef, relayed: &MessageRef) -> Result<Insert> {
        let res = sqlx::query(
            r#"
            INSERT INTO relayed_messages
                (original_chat_id, original_message_id, relayed_chat_id, relayed_message_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(original.chat_id.as_str())
        .bind(original.message_id.0)
        .bind(relayed.chat_id.as_str())
        .bind(relayed.message_id.0)
        .execute(self.store.pool())
        .await;

        classify_insert(res)
    }

    /// Relayed copies of `original`, in the order they were recorded.
    pub async fn lookup(&self, original: &MessageRef) -> Result<Vec<MessageRef>> {
        let rows: Vec<(String, i32)> = sqlx::query_as(
            r#"
            SELECT relayed_chat_id, relayed_message_id
            FROM relayed_messages
            WHERE original_chat_id = ? AND original_message_id = ?
            ORDER BY id
            "#,
        )
        .bind(original.chat_id.as_str())
        .bind(original.message_id.0)
        .fetch_all(self.store.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(chat, id)| MessageRef {
                chat_id: ChatId(chat),
                message_id: MessageId(id),
            })
            .collect())
    }

    /// Reverse lookup: which original a relayed copy came from.
    pub async fn original_of(&self, relayed: &MessageRef) -> Result<Option<MessageRef>> {
        let row: Option<(String, i32)> = sqlx::query_as(
            r#"
            SELECT original_chat_id, original_message_id
            FROM relayed_messages
            WHERE relayed_chat_id = ? AND relayed_message_id = ?
            "#,
        )
        .bind(relayed.chat_id.as_str())
        .bind(relayed.message_id.0)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(row.map(|(chat, id)| MessageRef {
            chat_id: ChatId(chat),
            message_id: MessageId(id),
        }))
    }

    /// Drop every link for `original`. Returns the number of links removed.
    pub async fn purge(&self, original: &MessageRef) -> Result<u64> {
        let res = sqlx::query(
            "DELETE FROM relayed_messages WHERE original_chat_id = ? AND original_message_id = ?",
        )
        .bind(original.chat_id.as_str())
        .bind(original.message_id.0)
        .execute(self.store.pool())
        .await?;

        Ok(res.rows_affected())
    }

    /// Drop the single link for one relayed copy.
    pub async fn remove_link(&self, relayed: &MessageRef) -> Result<Removal> {
        let res = sqlx::query(
            "DELETE FROM relayed_messages WHERE relayed_chat_id = ? AND relayed_message_id = ?",
        )
        .bind(relayed.chat_id.as_str())
        .bind(relayed.message_id.0)
        .execute(self.store.pool())
        .await?;

        Ok(classify_delete(&res))
    }
}
