//! # fedichess-core
//!
//! Protocol vocabulary for talking to the FediChess bridge process.
//!
//! This crate has no I/O. It provides:
//! - The `Message` value and reply/event classification
//! - The line codec used on the bridge's stdin/stdout
//! - Typed command shapes and a typed event view
//! - The shared error type

pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod message;

pub use codec::{decode, encode};
pub use command::Command;
pub use error::{BridgeError, Result};
pub use event::{BridgeEvent, EventKind};
pub use message::{Disposition, EVENT_FIELD, ID_FIELD, Message, Reply, classify, is_event, message_id};
