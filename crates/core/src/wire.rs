// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framed wire codec
//!
//! Every frame is a 5-byte header — kind byte, then body length as a
//! big-endian u32 — followed by that many body bytes.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Client-to-server: append a message to a topic's log
pub const KIND_PUBLISH: u8 = 0x01;

/// Client-to-server: become a topic's sole consumer
pub const KIND_SUBSCRIBE: u8 = 0x02;

/// Client-to-server: advance a topic's cursor by one
pub const KIND_ACK: u8 = 0x03;

/// Server-to-client: a delivered record.
///
/// Shares the ACK wire value. The two are told apart by direction alone:
/// a server never receives a MESSAGE frame, a client never receives an ACK.
pub const KIND_MESSAGE: u8 = 0x03;

/// Server-to-client: operation rejected; body is raw UTF-8 text
pub const KIND_ERROR: u8 = 0xFF;

/// Maximum accepted body length (1 MiB)
pub const MAX_BODY_LEN: u32 = 1024 * 1024;

/// Header size: kind byte plus the u32 body length
pub const HEADER_LEN: usize = 5;

/// Errors that can occur reading or writing frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("body length {0} exceeds the limit")]
    BodyTooLarge(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One header-plus-body unit on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u8,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(kind: u8, body: Vec<u8>) -> Self {
        Self { kind, body }
    }

    /// Encode header and body into a single buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.body.len());
        buf.push(self.kind);
        buf.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Read one frame from the stream.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly before sending
/// a header byte. A declared body length over [`MAX_BODY_LEN`] is rejected
/// without reading the body. A stream that ends mid-header or mid-body
/// surfaces as an IO error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];

    // First byte read separately so a clean close is not an error
    match reader.read(&mut header[..1]).await {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(FrameError::Io(e)),
    }
    reader.read_exact(&mut header[1..]).await?;

    let kind = header[0];
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if len > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLarge(len));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;

    Ok(Some(Frame { kind, body }))
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.to_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
