//! Line codec: one JSON object per line
//!
//! Anything that does not parse as a JSON object is not a protocol message.
//! `decode` returns `None` for it and the reader moves on.

use crate::error::Result;
use crate::message::Message;
use tracing::debug;

/// Serialize a message to a single line, without the trailing newline.
///
/// Compact JSON escapes control characters inside strings, so the output
/// never contains a raw `\n`.
pub fn encode(msg: &Message) -> Result<String> {
    Ok(serde_json::to_string(msg)?)
}

/// Parse one line. Trailing `\r`/whitespace is ignored; blank lines,
/// malformed JSON, invalid UTF-8 and non-object values all yield `None`.
pub fn decode(line: &[u8]) -> Option<Message> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Message>(trimmed) {
        Ok(msg) => Some(msg),
        Err(e) => {
            let preview: String = String::from_utf8_lossy(trimmed).chars().take(200).collect();
            debug!("Discarding undecodable line ({}): {}", e, preview);
            None
        }
    }
}
