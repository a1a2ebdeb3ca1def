// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt-line parsing for the interactive client

/// Printed for unrecognized input
pub const USAGE: &str =
    "commands: publish <topic> <message>, subscribe <topic>, ack <topic> <offset>, exit";

/// One parsed prompt command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Publish { topic: String, message: String },
    Subscribe { topic: String },
    Ack { topic: String, offset: i64 },
    Exit,
}

/// Parse one prompt line; `None` means unrecognized input.
///
/// The publish message is everything after the topic, re-joined on single
/// spaces.
pub fn parse_line(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();

    match parts.next()? {
        "publish" => {
            let topic = parts.next()?.to_string();
            let rest: Vec<&str> = parts.collect();
            if rest.is_empty() {
                return None;
            }
            Some(Command::Publish {
                topic,
                message: rest.join(" "),
            })
        }
        "subscribe" => {
            let topic = parts.next()?.to_string();
            Some(Command::Subscribe { topic })
        }
        "ack" => {
            let topic = parts.next()?.to_string();
            let offset = parts.next()?.parse().ok()?;
            Some(Command::Ack { topic, offset })
        }
        "exit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
#[path = "repl_tests.rs"]
mod tests;
