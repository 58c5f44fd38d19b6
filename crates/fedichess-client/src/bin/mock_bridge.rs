//! Scripted stand-in for the FediChess bridge
//!
//! Speaks the bridge's stdio protocol well enough to exercise clients
//! without Node or a network. Behaviour is chosen by a comma-separated mode
//! list in the first argument:
//!
//! - `echo` (default): answer every command with `ok: true`
//! - `no-peers`: answer `getPeers` without a `peers` field
//! - `garbage`: write malformed lines before every reply
//! - `stray`: write a reply for an id nobody sent before every reply
//! - `silent`: read commands, never answer
//! - `exit`: exit immediately
//! - `events=N`: emit N heartbeat events at startup
//!
//! Command handling in `echo`:
//! - `joinLobby` emits a `peerJoin` event for `p2` before the reply
//! - `getPeers` answers `["p2", "p3"]`
//! - `send` with action `burst` emits `payload.count` heartbeats first
//! - `send` with action `challenge` emits a `challResp` after the reply

use serde_json::{Value, json};
use std::io::{self, BufRead, Write};

#[derive(Debug, Default)]
struct Modes {
    no_peers: bool,
    garbage: bool,
    stray: bool,
    silent: bool,
    exit: bool,
    startup_events: u64,
}

impl Modes {
    fn parse(spec: &str) -> Self {
        let mut modes = Modes::default();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "echo" => {}
                "no-peers" => modes.no_peers = true,
                "garbage" => modes.garbage = true,
                "stray" => modes.stray = true,
                "silent" => modes.silent = true,
                "exit" => modes.exit = true,
                other => match other.strip_prefix("events=").map(str::parse::<u64>) {
                    Some(Ok(n)) => modes.startup_events = n,
                    _ => eprintln!("mock-bridge: ignoring unknown mode {:?}", other),
                },
            }
        }
        modes
    }
}

fn emit(out: &mut impl Write, msg: &Value) -> io::Result<()> {
    writeln!(out, "{}", msg)?;
    out.flush()
}

fn heartbeat(seq: u64) -> Value {
    json!({"event": "heartbeat", "peerId": "p2", "payload": {"seq": seq}})
}

fn handle(out: &mut impl Write, modes: &Modes, request: &Value) -> io::Result<()> {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let cmd = request.get("cmd").and_then(Value::as_str).unwrap_or("");

    if modes.garbage {
        writeln!(out, "this is not json")?;
        writeln!(out, "{{\"id\":{}", id)?;
        writeln!(out, "[1,2,3]")?;
        writeln!(out)?;
        out.flush()?;
    }
    if modes.stray {
        emit(out, &json!({"id": "req-999", "ok": true}))?;
    }

    match cmd {
        "joinLobby" => {
            emit(out, &json!({"event": "peerJoin", "peerId": "p2", "payload": null}))?;
            emit(out, &json!({"id": id, "ok": true}))
        }
        "leaveLobby" | "leaveGame" => emit(out, &json!({"id": id, "ok": true})),
        "joinGame" => emit(
            out,
            &json!({"id": id, "ok": true, "gameId": request.get("gameId")}),
        ),
        "getPeers" if modes.no_peers => emit(out, &json!({"id": id, "ok": true})),
        "getPeers" => emit(out, &json!({"id": id, "ok": true, "peers": ["p2", "p3"]})),
        "send" => {
            let action = request.get("action").and_then(Value::as_str).unwrap_or("");
            let payload = request.get("payload").cloned().unwrap_or(Value::Null);
            if action == "burst" {
                let count = payload.get("count").and_then(Value::as_u64).unwrap_or(0);
                for seq in 0..count {
                    emit(out, &heartbeat(seq))?;
                }
            }
            emit(out, &json!({"id": id, "ok": true}))?;
            if action == "challenge" {
                emit(
                    out,
                    &json!({
                        "event": "challResp",
                        "peerId": request.get("peerId"),
                        "payload": {"accept": true, "gameId": payload.get("gameId")}
                    }),
                )?;
            }
            Ok(())
        }
        other => emit(
            out,
            &json!({"id": id, "ok": false, "error": format!("Unknown cmd: {}", other)}),
        ),
    }
}

fn main() -> io::Result<()> {
    let modes = Modes::parse(&std::env::args().nth(1).unwrap_or_default());
    if modes.exit {
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for seq in 0..modes.startup_events {
        emit(&mut out, &heartbeat(seq))?;
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        if modes.silent {
            continue;
        }
        let Ok(request) = serde_json::from_str::<Value>(&line) else {
            eprintln!("mock-bridge: unparseable command {:?}", line);
            continue;
        };
        handle(&mut out, &modes, &request)?;
    }
    Ok(())
}
