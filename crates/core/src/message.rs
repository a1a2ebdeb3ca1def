// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol body types
//!
//! Every body is JSON. [`Record`] doubles as the on-disk WAL line and the
//! MESSAGE wire body; changing its field names breaks both surfaces.

use serde::{Deserialize, Serialize};

/// PUBLISH body: append `message` to `topic`'s log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publish {
    pub topic: String,
    pub message: String,
}

/// SUBSCRIBE body: become `topic`'s sole consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribe {
    pub topic: String,
}

/// ACK body: advance `topic`'s cursor by one.
///
/// `offset` is the sequence the client believes it acknowledged. The server
/// accepts it without checking it against its own cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub topic: String,
    pub offset: i64,
}

/// One published record, tagged with its zero-based per-topic sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub topic: String,
    pub message: String,
    pub id: u32,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
