//! Test doubles shared by the unit tests in this crate.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::port::ChatTransport,
    Result,
};

/// In-memory transport with scriptable per-chat / per-message failures.
#[derive(Default)]
pub(crate) struct FakeTransport {
    next_id: Mutex<i32>,
    sends: Mutex<Vec<(ChatId, String)>>,
    deletes: Mutex<Vec<MessageRef>>,
    failing_sends: Mutex<HashSet<ChatId>>,
    failing_deletes: Mutex<HashSet<MessageRef>>,
    handles: Mutex<HashMap<ChatId, ChatId>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    pub(crate) fn fail_sends_to(&self, chat_id: &str) {
        self.failing_sends
            .lock()
            .unwrap()
            .insert(ChatId::from(chat_id));
    }

    /// Report sends to `handle` under `chat_id`, as Telegram does for `@channel` addresses.
    pub(crate) fn resolve_handle(&self, handle: &str, chat_id: i64) {
        self.handles
            .lock()
            .unwrap()
            .insert(ChatId::from(handle), ChatId::from(chat_id));
    }

    pub(crate) fn fail_delete_of(&self, msg: &MessageRef) {
        self.failing_deletes.lock().unwrap().insert(msg.clone());
    }

    /// Every send attempt, including failed ones.
    pub(crate) fn sent(&self) -> Vec<(ChatId, String)> {
        self.sends.lock().unwrap().clone()
    }

    /// Every delete attempt, including failed ones.
    pub(crate) fn deleted(&self) -> Vec<MessageRef> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<MessageRef> {
        self.sends
            .lock()
            .unwrap()
            .push((chat_id.clone(), text.to_string()));

        if self.failing_sends.lock().unwrap().contains(chat_id) {
            return Err(Error::delivery(chat_id, "chat not found"));
        }

        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        let reported = self
            .handles
            .lock()
            .unwrap()
            .get(chat_id)
            .cloned()
            .unwrap_or_else(|| chat_id.clone());
        Ok(MessageRef {
            chat_id: reported,
            message_id: MessageId(id),
        })
    }

    async fn delete_message(&self, msg: &MessageRef) -> Result<()> {
        self.deletes.lock().unwrap().push(msg.clone());

        if self.failing_deletes.lock().unwrap().contains(msg) {
            return Err(Error::delivery(&msg.chat_id, "message to delete not found"));
        }
        Ok(())
    }
}
