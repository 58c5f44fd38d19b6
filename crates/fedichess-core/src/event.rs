//! Typed view over event messages

use crate::message::{EVENT_FIELD, Message};
use serde_json::Value;
use std::fmt;

/// Notification kinds emitted by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Heartbeat,
    Challenge,
    ChallengeResponse,
    Move,
    Chat,
    GameEvent,
    Sync,
    History,
    HistorySync,
    Role,
    PeerJoin,
    PeerLeave,
    /// Any name this client does not know about
    Other(String),
}

impl EventKind {
    /// Wire name of the event
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Heartbeat => "heartbeat",
            EventKind::Challenge => "challenge",
            EventKind::ChallengeResponse => "challResp",
            EventKind::Move => "move",
            EventKind::Chat => "chat",
            EventKind::GameEvent => "gameEvent",
            EventKind::Sync => "sync",
            EventKind::History => "history",
            EventKind::HistorySync => "histSync",
            EventKind::Role => "role",
            EventKind::PeerJoin => "peerJoin",
            EventKind::PeerLeave => "peerLeave",
            EventKind::Other(name) => name,
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        match name {
            "heartbeat" => EventKind::Heartbeat,
            "challenge" => EventKind::Challenge,
            "challResp" => EventKind::ChallengeResponse,
            "move" => EventKind::Move,
            "chat" => EventKind::Chat,
            "gameEvent" => EventKind::GameEvent,
            "sync" => EventKind::Sync,
            "history" => EventKind::History,
            "histSync" => EventKind::HistorySync,
            "role" => EventKind::Role,
            "peerJoin" => EventKind::PeerJoin,
            "peerLeave" => EventKind::PeerLeave,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event with its common fields pulled out
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeEvent {
    pub kind: EventKind,
    /// Peer the event came from; `null` on the wire maps to `None`
    pub peer_id: Option<String>,
    /// Action payload, `Value::Null` when absent
    pub payload: Value,
}

impl BridgeEvent {
    /// Build the typed view; `None` unless `event` is a string
    pub fn from_message(msg: &Message) -> Option<Self> {
        let kind = msg.get(EVENT_FIELD)?.as_str()?;
        Some(Self {
            kind: EventKind::from(kind),
            peer_id: msg
                .get("peerId")
                .and_then(Value::as_str)
                .map(str::to_string),
            payload: msg.get("payload").cloned().unwrap_or(Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(v: Value) -> Message {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn known_kinds_round_trip_their_names() {
        for name in [
            "heartbeat",
            "challenge",
            "challResp",
            "move",
            "chat",
            "gameEvent",
            "sync",
            "history",
            "histSync",
            "role",
            "peerJoin",
            "peerLeave",
        ] {
            let kind = EventKind::from(name);
            assert!(!matches!(kind, EventKind::Other(_)), "{name}");
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind = EventKind::from("peerJoined");
        assert_eq!(kind, EventKind::Other("peerJoined".into()));
        assert_eq!(kind.to_string(), "peerJoined");
    }

    #[test]
    fn typed_view_of_peer_leave() {
        let ev = BridgeEvent::from_message(&msg(
            json!({"event": "peerLeave", "peerId": null, "payload": null}),
        ))
        .unwrap();
        assert_eq!(ev.kind, EventKind::PeerLeave);
        assert_eq!(ev.peer_id, None);
        assert_eq!(ev.payload, Value::Null);
    }

    #[test]
    fn typed_view_needs_string_event() {
        assert!(BridgeEvent::from_message(&msg(json!({"id": "req-1"}))).is_none());
        assert!(BridgeEvent::from_message(&msg(json!({"event": 3}))).is_none());

        let ev = BridgeEvent::from_message(&msg(
            json!({"event": "challResp", "peerId": "p2", "payload": {"accept": true}}),
        ))
        .unwrap();
        assert_eq!(ev.kind, EventKind::ChallengeResponse);
        assert_eq!(ev.peer_id.as_deref(), Some("p2"));
        assert_eq!(ev.payload["accept"], json!(true));
    }
}
