//! Work Queue (C3) — persistent FIFO of envelopes with blocking consumption,
//! at-least-once delivery, and a parallel dead-letter channel. Spec §4.3.
//!
//! The broker backing this is explicitly out of scope (spec §1); what's
//! specified is the *contract* — blocking take with a short poll timeout,
//! at-least-once delivery, JSON-serialised envelopes, and a separate
//! dead-letter FIFO — so the worker's idempotency gate is what keeps the
//! choice of broker replaceable (spec §9, "Queue broker independence").
//! `InMemoryQueue` here is a complete, broker-independent implementation of
//! that contract; a production deployment can swap in a message-broker-backed
//! one behind the same trait without the worker's outer loop changing at all.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

use crate::models::Envelope;

pub const QUEUE_NAME: &str = "lore_anchor_tasks";
pub const DEAD_LETTER_QUEUE_NAME: &str = "lore_anchor_dead_letters";

/// A consumed queue item — either a well-formed envelope or the raw payload
/// that failed to parse as one (the caller routes the latter to the
/// dead-letter queue, per spec §4.4 step 2).
#[derive(Debug)]
pub enum QueueItem {
    Envelope(Envelope),
    Malformed(String),
}

/// A dead-lettered entry retained for operator inspection (spec §4.3).
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub payload: String,
    pub reason: String,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Publish one envelope. Spec §4.1: `upload`'s success guarantee is that
    /// exactly one envelope exists on the queue for the new image.
    async fn push(&self, envelope: &Envelope) -> anyhow::Result<()>;

    /// Blocking take with a short poll timeout (spec: "≈5 s") so a consumer
    /// can periodically check a shutdown flag. `Ok(None)` on timeout with
    /// nothing available.
    async fn take(&self, poll_timeout: Duration) -> anyhow::Result<Option<QueueItem>>;

    /// Divert an undeliverable payload to the dead-letter queue (spec §4.3).
    async fn push_dead_letter(&self, payload: String, reason: String) -> anyhow::Result<()>;

    async fn len(&self) -> usize;
    async fn dead_letter_len(&self) -> usize;
}

/// In-process FIFO satisfying the Work Queue contract. JSON-serialises
/// envelopes on `push` the same way a real broker message body would be, so
/// a malformed payload (hand-crafted in a test, or corrupted by a prior
/// process crash) is detected the same way it would be against a real
/// broker: deserialisation failure on `take`, not a type mismatch at push
/// time.
pub struct InMemoryQueue {
    inner: Mutex<VecDeque<String>>,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            dead_letters: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Push a raw, possibly-malformed JSON payload directly. Used by tests
    /// that simulate a corrupted or stale broker message.
    pub async fn push_raw(&self, payload: String) {
        self.inner.lock().await.push_back(payload);
        self.notify.notify_one();
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.iter().cloned().collect()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn push(&self, envelope: &Envelope) -> anyhow::Result<()> {
        let payload = serde_json::to_string(envelope)?;
        self.push_raw(payload).await;
        Ok(())
    }

    async fn take(&self, poll_timeout: Duration) -> anyhow::Result<Option<QueueItem>> {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if let Some(payload) = guard.pop_front() {
                    drop(guard);
                    return Ok(Some(match serde_json::from_str::<Envelope>(&payload) {
                        Ok(envelope) => QueueItem::Envelope(envelope),
                        Err(_) => QueueItem::Malformed(payload),
                    }));
                }
            }
            // Wait for a notification or the poll timeout, whichever first —
            // mirrors a real broker's blocking take with a bounded poll.
            if timeout(poll_timeout, self.notify.notified()).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn push_dead_letter(&self, payload: String, reason: String) -> anyhow::Result<()> {
        self.dead_letters
            .lock()
            .await
            .push_back(DeadLetter { payload, reason });
        Ok(())
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    async fn dead_letter_len(&self) -> usize {
        self.dead_letters.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn push_then_take_is_fifo() {
        let q = InMemoryQueue::new();
        let e1 = Envelope {
            image_id: Uuid::now_v7(),
            storage_key: "raw/u1/a.png".into(),
        };
        let e2 = Envelope {
            image_id: Uuid::now_v7(),
            storage_key: "raw/u1/b.png".into(),
        };
        q.push(&e1).await.unwrap();
        q.push(&e2).await.unwrap();

        let first = q.take(Duration::from_millis(50)).await.unwrap().unwrap();
        match first {
            QueueItem::Envelope(env) => assert_eq!(env.image_id, e1.image_id),
            _ => panic!("expected envelope"),
        }
    }

    #[tokio::test]
    async fn take_times_out_on_empty_queue() {
        let q = InMemoryQueue::new();
        let item = q.take(Duration::from_millis(20)).await.unwrap();
        assert!(item.is_none());
    }

    #[tokio::test]
    async fn malformed_payload_surfaces_for_dead_lettering() {
        let q = InMemoryQueue::new();
        q.push_raw("not json".to_string()).await;
        let item = q.take(Duration::from_millis(50)).await.unwrap().unwrap();
        assert!(matches!(item, QueueItem::Malformed(_)));

        q.push_dead_letter("not json".to_string(), "parse error".to_string())
            .await
            .unwrap();
        assert_eq!(q.dead_letter_len().await, 1);
    }
}
