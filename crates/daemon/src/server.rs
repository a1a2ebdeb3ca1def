// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::fs::File;
use std::sync::Arc;

use fs2::FileExt;
use relay_broker::{Broker, FrameReceiver, FrameSender, SubscribeError, Subscriber};
use relay_core::{
    read_frame, Ack, Frame, FrameError, Publish, Subscribe, KIND_ACK, KIND_ERROR, KIND_PUBLISH,
    KIND_SUBSCRIBE,
};
use relay_storage::{OffsetStore, Wal};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Fixed ERROR body for a rejected subscribe
const CONSUMER_CONFLICT: &str = "topic already has a consumer";

/// Startup errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("data directory already locked by another relayd ({0})")]
    AlreadyRunning(String),
    #[error("storage error: {0}")]
    Storage(#[from] relay_storage::StorageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound broker server, ready to accept connections
pub struct Server {
    listener: TcpListener,
    broker: Arc<Broker>,
    // NOTE(lifetime): Held to maintain exclusive data-dir lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl Server {
    /// Acquire the data-dir lock, open the stores, and bind the listener
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let lock_file = acquire_lock(config)?;

        let wal = Wal::open(&config.wal_dir)?;
        let offsets = OffsetStore::new(&config.offsets_path);
        offsets.load()?;
        let broker = Arc::new(Broker::new(wal, offsets));

        let listener = TcpListener::bind(&config.listen_addr).await?;

        Ok(Self {
            listener,
            broker,
            lock_file,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the process stops
    pub async fn run(self) {
        let mut next_conn_id: u64 = 0;

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    next_conn_id += 1;
                    let conn_id = next_conn_id;
                    debug!(conn_id, %peer, "connection accepted");

                    let broker = Arc::clone(&self.broker);
                    tokio::spawn(handle_connection(broker, stream, conn_id));
                }
                Err(e) => {
                    error!("error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Take the exclusive data-dir lock; a held lock means another relayd owns
/// this WAL directory
fn acquire_lock(config: &Config) -> Result<File, ServerError> {
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(&config.lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| ServerError::AlreadyRunning(config.lock_path.display().to_string()))?;
    Ok(file)
}

/// Handle one client connection until the peer disconnects or violates the
/// protocol.
///
/// A sibling writer task owns the write half and drains the outbox — both
/// handler-originated frames (ERROR) and broker deliveries land there.
/// Dropping the sender lets the writer drain and close the socket.
pub async fn handle_connection(broker: Arc<Broker>, stream: TcpStream, conn_id: u64) {
    let (mut reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(run_writer(writer, rx, conn_id));

    read_loop(&broker, &mut reader, &tx, conn_id).await;

    broker.release_connection(conn_id);
    drop(tx);
    let _ = writer_task.await;
    debug!(conn_id, "connection closed");
}

async fn read_loop(broker: &Broker, reader: &mut OwnedReadHalf, outbox: &FrameSender, conn_id: u64) {
    loop {
        let frame = match read_frame(reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return, // peer closed cleanly
            Err(FrameError::BodyTooLarge(len)) => {
                warn!(conn_id, len, "body size exceeds limit, closing connection");
                return;
            }
            Err(FrameError::Io(e)) => {
                warn!(conn_id, "error reading frame: {}", e);
                return;
            }
        };

        match frame.kind {
            KIND_PUBLISH => {
                let publish: Publish = match serde_json::from_slice(&frame.body) {
                    Ok(p) => p,
                    Err(e) => {
                        // Non-fatal: the message is dropped, the connection stays open
                        warn!(conn_id, "error decoding PUBLISH body: {}", e);
                        continue;
                    }
                };

                match broker.publish(&publish.topic, &publish.message) {
                    Ok(record) => {
                        debug!(conn_id, topic = %record.topic, id = record.id, "record appended");
                    }
                    Err(e) => {
                        error!(conn_id, topic = %publish.topic, "error appending record: {}", e);
                    }
                }
            }

            KIND_SUBSCRIBE => {
                let subscribe: Subscribe = match serde_json::from_slice(&frame.body) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(conn_id, "error decoding SUBSCRIBE body: {}", e);
                        return;
                    }
                };

                let subscriber = Subscriber::new(conn_id, outbox.clone());
                match broker.subscribe(&subscribe.topic, subscriber) {
                    Ok(()) => {
                        info!(conn_id, topic = %subscribe.topic, "new subscription");
                    }
                    Err(SubscribeError::TopicClaimed) => {
                        warn!(conn_id, topic = %subscribe.topic, "subscription rejected: {}", CONSUMER_CONFLICT);
                        let _ = outbox.send(Frame::new(
                            KIND_ERROR,
                            CONSUMER_CONFLICT.as_bytes().to_vec(),
                        ));
                        return;
                    }
                    Err(SubscribeError::Storage(e)) => {
                        // The subscription is installed; only the snapshot failed
                        error!(conn_id, topic = %subscribe.topic, "error saving offsets: {}", e);
                    }
                }
            }

            KIND_ACK => {
                let ack: Ack = match serde_json::from_slice(&frame.body) {
                    Ok(a) => a,
                    Err(e) => {
                        warn!(conn_id, "error decoding ACK body: {}", e);
                        return;
                    }
                };

                // The client-supplied offset is logged but never checked
                // against the cursor
                info!(conn_id, topic = %ack.topic, offset = ack.offset, "ACK received");
                if let Err(e) = broker.acknowledge(&ack.topic) {
                    error!(conn_id, topic = %ack.topic, "error saving offsets: {}", e);
                }
            }

            kind => {
                warn!(conn_id, kind, "unknown message kind, closing connection");
                return;
            }
        }
    }
}

/// Drain the outbox onto the socket. Exits when the channel is closed and
/// drained, or at the first write error.
async fn run_writer(mut writer: OwnedWriteHalf, mut rx: FrameReceiver, conn_id: u64) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame.to_bytes()).await {
            warn!(conn_id, "error writing frame: {}", e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}
