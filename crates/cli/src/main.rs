// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relay - interactive client for the relay message broker
//!
//! Reads commands from stdin and renders frames pushed by the server while
//! the prompt is open.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod repl;

use std::io::Write as _;

use anyhow::Result;
use clap::Parser;
use relay_core::{
    read_frame, write_frame, Ack, Frame, Publish, Record, Subscribe, KIND_ACK, KIND_ERROR,
    KIND_MESSAGE, KIND_PUBLISH, KIND_SUBSCRIBE,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

use crate::repl::{parse_line, Command, USAGE};

#[derive(Parser)]
#[command(name = "relay", version, about = "Relay message broker client")]
struct Cli {
    /// Broker address
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let stream = TcpStream::connect(&cli.addr).await?;
    println!("connected to {}", cli.addr);

    let (reader, mut writer) = stream.into_split();

    // Deliveries arrive whenever the server pushes them, not in
    // request/response lockstep, so rendering gets its own task
    tokio::spawn(render_incoming(reader));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Some(Command::Publish { topic, message }) => {
                let body = serde_json::to_vec(&Publish { topic, message })?;
                write_frame(&mut writer, &Frame::new(KIND_PUBLISH, body)).await?;
            }
            Some(Command::Subscribe { topic }) => {
                let body = serde_json::to_vec(&Subscribe { topic })?;
                write_frame(&mut writer, &Frame::new(KIND_SUBSCRIBE, body)).await?;
            }
            Some(Command::Ack { topic, offset }) => {
                let body = serde_json::to_vec(&Ack { topic, offset })?;
                write_frame(&mut writer, &Frame::new(KIND_ACK, body)).await?;
            }
            Some(Command::Exit) => break,
            None => {
                if !line.trim().is_empty() {
                    println!("{}", USAGE);
                }
            }
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Render server frames until the connection closes
async fn render_incoming(mut reader: OwnedReadHalf) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => match frame.kind {
                KIND_MESSAGE => match serde_json::from_slice::<Record>(&frame.body) {
                    Ok(record) => {
                        println!("{}[{}] {}", record.topic, record.id, record.message);
                    }
                    Err(e) => eprintln!("bad MESSAGE frame from server: {}", e),
                },
                KIND_ERROR => {
                    eprintln!("server error: {}", String::from_utf8_lossy(&frame.body));
                }
                kind => {
                    eprintln!("unexpected frame from server (kind {:#04x})", kind);
                }
            },
            Ok(None) => {
                eprintln!("server closed the connection");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("error reading from server: {}", e);
                std::process::exit(1);
            }
        }
    }
}
