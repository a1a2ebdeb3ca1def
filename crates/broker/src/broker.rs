// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker: publish, subscribe, and acknowledge around one delivery
//! primitive
//!
//! Delivery is driven purely by those three events and the persisted
//! cursor — no background poller. A consumer whose cursor already points
//! past the log end hears nothing until the next publish or ack for that
//! topic moves something under the cursor.

use relay_core::{Frame, Record, KIND_MESSAGE};
use relay_storage::{OffsetStore, StorageError, Wal};
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::{Subscriber, SubscriberRegistry};

/// Subscribe failures reported to the connection handler
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// The topic already has a live consumer
    #[error("topic already has a consumer")]
    TopicClaimed,
    /// The subscription is installed but the cursor snapshot failed to
    /// persist
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Owns the WAL, the offset store, and the subscription registry
pub struct Broker {
    wal: Wal,
    offsets: OffsetStore,
    registry: SubscriberRegistry,
}

impl Broker {
    pub fn new(wal: Wal, offsets: OffsetStore) -> Self {
        Self {
            wal,
            offsets,
            registry: SubscriberRegistry::new(),
        }
    }

    /// Install `subscriber` as `topic`'s sole consumer.
    ///
    /// On success the topic's cursor is created at 0 if absent, the record
    /// at the current cursor (the oldest unacknowledged one, if any) is
    /// delivered, and the cursor snapshot is persisted. A snapshot failure
    /// leaves the subscription installed.
    pub fn subscribe(&self, topic: &str, subscriber: Subscriber) -> Result<(), SubscribeError> {
        if !self.registry.claim(topic, subscriber.clone()) {
            return Err(SubscribeError::TopicClaimed);
        }

        self.offsets.init_topic(topic);
        self.deliver_at(&subscriber, topic, self.offsets.get(topic));
        self.offsets.save()?;
        Ok(())
    }

    /// Append to the WAL and, when the topic has a consumer, attempt
    /// delivery at the topic's current cursor.
    ///
    /// The delivered record is whatever sits at the unacknowledged cursor
    /// position — not necessarily the record just appended. A cursor ahead
    /// of the log end delivers nothing. An append failure has no side
    /// effects; no delivery is attempted.
    pub fn publish(&self, topic: &str, message: &str) -> Result<Record, StorageError> {
        let record = self.wal.append(topic, message)?;

        if let Some(subscriber) = self.registry.get(topic) {
            self.deliver_at(&subscriber, topic, self.offsets.get(topic));
        }

        Ok(record)
    }

    /// Advance `topic`'s cursor by one, attempt delivery at the new cursor,
    /// and persist the snapshot.
    ///
    /// The in-memory cursor keeps its new value even when the snapshot
    /// write fails; a crash before the next successful save re-delivers the
    /// acknowledged record on restart (at-least-once, never at-most-once).
    pub fn acknowledge(&self, topic: &str) -> Result<i64, StorageError> {
        let offset = self.offsets.increment(topic);

        if let Some(subscriber) = self.registry.get(topic) {
            self.deliver_at(&subscriber, topic, offset);
        }

        self.offsets.save()?;
        Ok(offset)
    }

    /// Release every subscription held by `conn_id`; called when its
    /// connection handler returns
    pub fn release_connection(&self, conn_id: u64) {
        self.registry.release_connection(conn_id);
    }

    /// Current cursor for a topic
    pub fn cursor(&self, topic: &str) -> i64 {
        self.offsets.get(topic)
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// The single delivery primitive behind subscribe, publish, and
    /// acknowledge: push the record at `sequence` to `subscriber`, or do
    /// nothing if no such record exists yet.
    fn deliver_at(&self, subscriber: &Subscriber, topic: &str, sequence: i64) {
        let record = match self.wal.read_at(topic, sequence) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!(topic, sequence, error = %e, "delivery read failed");
                return;
            }
        };

        let body = match serde_json::to_vec(&record) {
            Ok(body) => body,
            Err(e) => {
                warn!(topic, sequence, error = %e, "delivery encode failed");
                return;
            }
        };

        if !subscriber.send(Frame::new(KIND_MESSAGE, body)) {
            debug!(
                topic,
                conn_id = subscriber.conn_id,
                "subscriber outbox closed, delivery dropped"
            );
        }
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
