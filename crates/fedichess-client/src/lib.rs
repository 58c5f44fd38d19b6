//! # fedichess-client
//!
//! Runtime for driving a FediChess bridge process over stdio.
//!
//! The bridge speaks newline-delimited JSON: the client writes commands to
//! its stdin and reads interleaved replies and events from its stdout. This
//! crate provides:
//! - `LineTransport`: process supervision and line I/O with deadlines
//! - `EventQueue`: FIFO of events seen while waiting for replies
//! - `Correlator`: request ids and reply matching
//! - `BridgeClient`: the public API (`join_lobby`, `send`, `poll_event`, ...)

pub mod client;
pub mod config;
pub mod correlator;
pub mod launcher;
pub mod queue;
pub mod transport;

pub use client::BridgeClient;
pub use config::{BridgeConfig, TimeoutPolicy};
pub use correlator::{Correlator, RequestIds};
pub use launcher::{KillLauncher, PlatformLauncher, ProcessLauncher};
#[cfg(unix)]
pub use launcher::SignalLauncher;
pub use queue::EventQueue;
pub use transport::{LineReader, LineTransport, ReadOutcome};

pub use fedichess_core::{BridgeError, BridgeEvent, Command, EventKind, Message, Reply, Result};
