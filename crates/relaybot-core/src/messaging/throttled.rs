use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::port::ChatTransport,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls to the same chat (Telegram ~1 msg/sec per chat).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }

    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ChatTransport decorator that rate-limits outbound calls.
///
/// A fan-out to many groups would otherwise burst past Telegram's global limit.
/// Reservations are taken under short-lived locks; the sleep itself happens
/// with no lock held, so destinations in different chats still proceed in parallel.
pub struct ThrottledTransport {
    inner: Arc<dyn ChatTransport>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledTransport {
    pub fn new(inner: Arc<dyn ChatTransport>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: &ChatId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        // An idle limiter behaves exactly like a fresh one, so it can be dropped.
        let now = Instant::now();
        map.retain(|id, lim| id == chat_id || !is_idle(lim, now));
        map.entry(chat_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: &ChatId) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

fn is_idle(lim: &Arc<Mutex<IntervalLimiter>>, now: Instant) -> bool {
    if Arc::strong_count(lim) > 1 {
        return false;
    }
    lim.try_lock().is_ok_and(|l| l.next <= now)
}

#[async_trait::async_trait]
impl ChatTransport for ThrottledTransport {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<MessageRef> {
        self.throttle_chat(chat_id).await;
        self.inner.send_text(chat_id, text).await
    }

    async fn delete_message(&self, msg: &MessageRef) -> Result<()> {
        self.throttle_chat(&msg.chat_id).await;
        self.inner.delete_message(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;

    #[test]
    fn limiter_spaces_reservations() {
        let start = Instant::now();
        let mut lim = IntervalLimiter {
            interval: Duration::from_millis(100),
            next: start,
        };

        assert_eq!(lim.reserve_at(start), Duration::ZERO);
        assert_eq!(lim.reserve_at(start), Duration::from_millis(100));
        assert_eq!(lim.reserve_at(start), Duration::from_millis(200));

        // Idle long enough: no wait.
        assert_eq!(
            lim.reserve_at(start + Duration::from_secs(5)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn same_chat_calls_are_spaced() {
        let fake = Arc::new(FakeTransport::new());
        let throttled = ThrottledTransport::new(
            fake.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(10),
                per_chat_min_interval: Duration::from_millis(1000),
            },
        );

        let chat = ChatId::from("-1");
        let start = Instant::now();
        throttled.send_text(&chat, "a").await.unwrap();
        throttled.send_text(&chat, "b").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));

        let other = ChatId::from("-2");
        let before = Instant::now();
        throttled.send_text(&other, "c").await.unwrap();
        assert!(before.elapsed() < Duration::from_millis(1000));

        assert_eq!(fake.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_chat_limiters_are_dropped() {
        let throttled = ThrottledTransport::new(
            Arc::new(FakeTransport::new()),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(10),
                per_chat_min_interval: Duration::from_millis(1000),
            },
        );

        throttled.send_text(&ChatId::from("-1"), "a").await.unwrap();
        throttled.send_text(&ChatId::from("-2"), "b").await.unwrap();
        assert_eq!(throttled.per_chat.lock().await.len(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        throttled.send_text(&ChatId::from("-3"), "c").await.unwrap();

        let map = throttled.per_chat.lock().await;
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&ChatId::from("-3")));
    }
}
