//! Outgoing command shapes understood by the bridge
//!
//! Commands serialize with an internal `cmd` tag, e.g.
//! `{"cmd":"joinGame","gameId":"..."}`. The request id is injected later by
//! the correlator and is not part of the command itself.

use crate::error::{BridgeError, Result};
use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Commands sent to the bridge
///
/// Note: `rename_all` on enums only affects variant names, so multi-word
/// fields carry an explicit `rename`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    /// Join the global lobby room
    JoinLobby,

    /// Leave the lobby room
    LeaveLobby,

    /// Join the room of a specific game
    JoinGame {
        #[serde(rename = "gameId")]
        game_id: String,
    },

    /// Leave the current game room
    LeaveGame,

    /// List peers in the current room
    GetPeers,

    /// Broadcast (or direct, with `peerId`) an action to the room
    Send {
        action: String,
        payload: serde_json::Value,
        #[serde(rename = "peerId", skip_serializing_if = "Option::is_none", default)]
        peer_id: Option<String>,
    },
}

impl Command {
    /// Generic send envelope
    pub fn send(
        action: impl Into<String>,
        payload: serde_json::Value,
        peer_id: Option<String>,
    ) -> Self {
        Command::Send {
            action: action.into(),
            payload,
            peer_id,
        }
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::JoinLobby => "joinLobby",
            Command::LeaveLobby => "leaveLobby",
            Command::JoinGame { .. } => "joinGame",
            Command::LeaveGame => "leaveGame",
            Command::GetPeers => "getPeers",
            Command::Send { .. } => "send",
        }
    }

    /// Convert to a request body ready for id injection
    pub fn into_message(self) -> Result<Message> {
        match serde_json::to_value(&self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(BridgeError::ProtocolError(format!(
                "command {} did not serialize to an object: {}",
                self.name(),
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unit_commands_carry_only_cmd() {
        let body = Command::JoinLobby.into_message().unwrap();
        assert_eq!(serde_json::Value::Object(body), json!({"cmd": "joinLobby"}));
        let body = Command::GetPeers.into_message().unwrap();
        assert_eq!(serde_json::Value::Object(body), json!({"cmd": "getPeers"}));
    }

    #[test]
    fn join_game_uses_camel_case_field() {
        let body = Command::JoinGame {
            game_id: "g-1".into(),
        }
        .into_message()
        .unwrap();
        assert_eq!(
            serde_json::Value::Object(body),
            json!({"cmd": "joinGame", "gameId": "g-1"})
        );
    }

    #[test]
    fn send_omits_absent_peer() {
        let body = Command::send("heartbeat", json!({"elo": 1200}), None)
            .into_message()
            .unwrap();
        assert_eq!(
            serde_json::Value::Object(body),
            json!({"cmd": "send", "action": "heartbeat", "payload": {"elo": 1200}})
        );

        let direct = Command::send("challenge", json!(null), Some("p2".into()));
        assert_eq!(direct.name(), "send");
        let body = direct.into_message().unwrap();
        assert_eq!(body.get("peerId"), Some(&json!("p2")));
    }

    #[test]
    fn parses_bridge_style_json() {
        let cmd: Command =
            serde_json::from_str(r#"{"cmd":"send","action":"chat","payload":"hi","peerId":"p9"}"#)
                .unwrap();
        assert_eq!(cmd, Command::send("chat", json!("hi"), Some("p9".into())));
    }
}
