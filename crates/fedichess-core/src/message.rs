//! Message values exchanged with the bridge
//!
//! Every line on the wire is one JSON object. Two shapes matter to the
//! client: replies, which echo the `id` of the request they answer, and
//! events, which carry an `event` field naming an unsolicited notification.

use crate::error::BridgeError;
use serde_json::Value;

/// A decoded protocol message: a JSON object keyed by field name
pub type Message = serde_json::Map<String, Value>;

/// Field carrying the request identifier
pub const ID_FIELD: &str = "id";

/// Field naming an event's kind
pub const EVENT_FIELD: &str = "event";

/// Identifier string of a message, if it has one
pub fn message_id(msg: &Message) -> Option<&str> {
    msg.get(ID_FIELD).and_then(Value::as_str)
}

/// Whether a message is event-shaped
pub fn is_event(msg: &Message) -> bool {
    msg.contains_key(EVENT_FIELD)
}

/// Where an inbound message should go, relative to the awaited request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Answers the request currently being awaited
    Reply,
    /// Asynchronous notification, belongs in the event queue
    Event,
    /// Reply-shaped but nobody is waiting for it
    Unmatched,
}

/// Classify an inbound message against the pending request id.
///
/// The id match wins over the `event` field, so a message carrying both
/// is delivered as the reply.
pub fn classify(msg: &Message, pending: Option<&str>) -> Disposition {
    match (message_id(msg), pending) {
        (Some(id), Some(want)) if id == want => Disposition::Reply,
        _ if is_event(msg) => Disposition::Event,
        _ => Disposition::Unmatched,
    }
}

/// A reply to a request, or a locally built error reply
#[derive(Debug, Clone, PartialEq)]
pub struct Reply(Message);

impl Reply {
    /// Wrap a reply message received from the bridge
    pub fn from_message(msg: Message) -> Self {
        Self(msg)
    }

    /// Build an error reply: `{"ok": false, "error": reason}`
    pub fn failure(reason: impl Into<String>) -> Self {
        let mut msg = Message::new();
        msg.insert("ok".into(), Value::Bool(false));
        msg.insert("error".into(), Value::String(reason.into()));
        Self(msg)
    }

    /// `ok` field, false when absent or not a boolean
    pub fn is_ok(&self) -> bool {
        self.0.get("ok").and_then(Value::as_bool).unwrap_or(false)
    }

    /// `error` diagnostic, if any
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Request identifier echoed by the bridge
    pub fn id(&self) -> Option<&str> {
        message_id(&self.0)
    }

    /// Peer identifiers from the `peers` field.
    ///
    /// An absent field, a non-array, or an array holding anything other
    /// than strings all yield an empty list.
    pub fn peers(&self) -> Vec<String> {
        let Some(items) = self.0.get("peers").and_then(Value::as_array) else {
            return Vec::new();
        };
        items
            .iter()
            .map(|p| p.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default()
    }

    /// Raw field access
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_message(&self) -> &Message {
        &self.0
    }

    pub fn into_message(self) -> Message {
        self.0
    }
}

impl From<BridgeError> for Reply {
    fn from(err: BridgeError) -> Self {
        Reply::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(v: Value) -> Message {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn classify_prefers_matching_id() {
        let both = msg(json!({"id": "req-3", "event": "heartbeat"}));
        assert_eq!(classify(&both, Some("req-3")), Disposition::Reply);
        assert_eq!(classify(&both, Some("req-4")), Disposition::Event);
        assert_eq!(classify(&both, None), Disposition::Event);
    }

    #[test]
    fn classify_unmatched_reply() {
        let stray = msg(json!({"id": "req-9", "ok": true}));
        assert_eq!(classify(&stray, Some("req-1")), Disposition::Unmatched);
        assert_eq!(classify(&stray, None), Disposition::Unmatched);
        let numeric_id = msg(json!({"id": 1, "ok": true}));
        assert_eq!(classify(&numeric_id, Some("1")), Disposition::Unmatched);
    }

    #[test]
    fn failure_reply_shape() {
        let reply = Reply::from(BridgeError::NoResponse);
        assert!(!reply.is_ok());
        assert_eq!(reply.error(), Some("no response"));
        assert_eq!(reply.id(), None);
    }

    #[test]
    fn peers_well_formed() {
        let reply = Reply::from_message(msg(json!({"id": "req-2", "peers": ["p2", "p3"]})));
        assert_eq!(reply.peers(), vec!["p2".to_string(), "p3".to_string()]);
    }

    #[test]
    fn peers_missing_or_malformed_is_empty() {
        let absent = Reply::from_message(msg(json!({"id": "req-2", "ok": true})));
        assert!(absent.peers().is_empty());
        let not_array = Reply::from_message(msg(json!({"peers": "p2"})));
        assert!(not_array.peers().is_empty());
        let mixed = Reply::from_message(msg(json!({"peers": ["p2", 7]})));
        assert!(mixed.peers().is_empty());
    }
}
