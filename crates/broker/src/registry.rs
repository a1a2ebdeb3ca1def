// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-consumer subscription registry

use relay_core::Frame;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;

/// Sender half of a connection's outbox; frames queued here are written to
/// the socket by the connection's writer task
pub type FrameSender = mpsc::UnboundedSender<Frame>;

/// Receiver half of a connection's outbox
pub type FrameReceiver = mpsc::UnboundedReceiver<Frame>;

/// A topic's sole consumer: a connection id and its outbox
#[derive(Clone)]
pub struct Subscriber {
    pub conn_id: u64,
    sender: FrameSender,
}

impl Subscriber {
    pub fn new(conn_id: u64, sender: FrameSender) -> Self {
        Self { conn_id, sender }
    }

    /// Queue a frame for the consumer's writer task.
    ///
    /// Returns false when the outbox is closed — the connection is already
    /// going away and the frame is dropped.
    pub fn send(&self, frame: Frame) -> bool {
        self.sender.send(frame).is_ok()
    }
}

/// Topic → consumer map; at most one live entry per topic.
///
/// All access goes through atomic check-and-set operations — the map itself
/// is never exposed for ad-hoc mutation.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: RwLock<HashMap<String, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `subscriber` as the topic's sole consumer.
    ///
    /// Check-and-install is one critical section: if the topic already has
    /// a consumer this returns false and leaves the existing entry intact.
    pub fn claim(&self, topic: &str, subscriber: Subscriber) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.contains_key(topic) {
            return false;
        }
        inner.insert(topic.to_string(), subscriber);
        true
    }

    /// Current consumer for a topic, if any
    pub fn get(&self, topic: &str) -> Option<Subscriber> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
            .cloned()
    }

    /// Drop every subscription held by a connection.
    ///
    /// Called when the connection's handler returns, so its topics become
    /// claimable again.
    pub fn release_connection(&self, conn_id: u64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.retain(|_, sub| sub.conn_id != conn_id);
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
