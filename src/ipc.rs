// ~/thematic-backgrounds/src/ipc.rs

use std::{
    io::{BufRead, Write},
    sync::mpsc::{self, Receiver},
    thread,
};

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{warn, DEBUG_NAME};

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(Value),
    /// The reader hit EOF or a read error; nothing more will arrive.
    Closed,
}

/// Reads JSON lines on a background thread and forwards each parsed value.
/// Blank and unparsable lines are dropped.
pub fn spawn_listener<R>(reader: R) -> Receiver<Inbound>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Inbound>();

    thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("[{}][IPC] Failed to read request line: {}", DEBUG_NAME, e);
                    break;
                }
            };

            if let Some(value) = parse_line(&line) {
                if tx.send(Inbound::Message(value)).is_err() {
                    return;
                }
            }
        }
        let _ = tx.send(Inbound::Closed);
    });

    rx
}

pub fn spawn_stdin_listener() -> Receiver<Inbound> {
    spawn_listener(std::io::BufReader::new(std::io::stdin()))
}

pub fn parse_line(line: &str) -> Option<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("[{}][IPC] Ignoring malformed request: {:?}", DEBUG_NAME, e);
            None
        }
    }
}

/// Writes one response as a single JSON line.
pub fn write_response<W: Write, T: Serialize + ?Sized>(out: &mut W, response: &T) -> Result<()> {
    let line = serde_json::to_string(response)?;
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}

/// Reply sent when handling a request failed for reasons outside the
/// request itself (unreadable storage, missing theme, ...).
pub fn error_response(err: &anyhow::Error) -> Value {
    json!({ "ok": false, "error": format!("{err:#}") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn listener_forwards_valid_lines_then_closes() {
        let input = "{\"type\":\"getState\"}\n\nnot json\n{\"type\":\"next\"}\n";
        let rx = spawn_listener(Cursor::new(input.as_bytes().to_vec()));

        let received: Vec<Inbound> = rx.iter().collect();
        assert_eq!(
            received,
            vec![
                Inbound::Message(json!({ "type": "getState" })),
                Inbound::Message(json!({ "type": "next" })),
                Inbound::Closed,
            ]
        );
    }

    #[test]
    fn responses_are_single_lines() {
        let mut out = Vec::new();
        write_response(&mut out, &json!({ "ok": true })).unwrap();
        write_response(&mut out, &error_response(&anyhow::anyhow!("disk gone"))).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![r#"{"ok":true}"#, r#"{"error":"disk gone","ok":false}"#]);
    }
}
