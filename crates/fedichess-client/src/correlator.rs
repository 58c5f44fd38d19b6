//! Request/response correlation
//!
//! Every request gets a fresh `req-<n>` id and then polls the transport
//! until a message echoing that id shows up. Events read along the way go
//! to the event queue in arrival order; reply-shaped messages for any other
//! id are logged and dropped.
//!
//! Only one request is in flight per client: `send_and_await` holds the
//! request gate for its whole cycle. Event polling may run concurrently; if
//! an event poller happens to read the awaited reply it stashes it for the
//! waiting request instead of dropping it.

use crate::config::TimeoutPolicy;
use crate::queue::EventQueue;
use crate::transport::{LineTransport, ReadOutcome};
use fedichess_core::{BridgeError, Disposition, ID_FIELD, Message, Result, classify, decode, encode};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

/// Per-client request id allocator; ids start at `req-1` and are never reused
#[derive(Debug, Default)]
pub struct RequestIds {
    counter: AtomicU64,
}

impl RequestIds {
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("req-{}", n)
    }
}

/// The awaited id and a reply some other reader picked up for it
#[derive(Debug, Default)]
struct Pending {
    id: Option<String>,
    stashed: Option<Message>,
}

/// Clears the pending slot however the request cycle ends, including when
/// the caller drops the future mid-wait.
struct PendingGuard<'a>(&'a Correlator);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.0.pending();
        pending.id = None;
        pending.stashed = None;
    }
}

/// Matches replies to requests and routes events to the queue
pub struct Correlator {
    transport: LineTransport,
    events: EventQueue,
    ids: RequestIds,
    pending: Mutex<Pending>,
    request_gate: tokio::sync::Mutex<()>,
}

impl Correlator {
    pub fn new(transport: LineTransport) -> Self {
        Self {
            transport,
            events: EventQueue::new(),
            ids: RequestIds::default(),
            pending: Mutex::new(Pending::default()),
            request_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn transport(&self) -> &LineTransport {
        &self.transport
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_id(&self) -> Option<String> {
        self.pending().id.clone()
    }

    fn take_stashed(&self) -> Option<Message> {
        self.pending().stashed.take()
    }

    /// Keep a reply read by an event poller, if it is still awaited
    fn stash(&self, reply: Message) {
        let mut pending = self.pending();
        let awaited = pending.id.as_deref();
        if awaited.is_some() && awaited == reply.get(ID_FIELD).and_then(Value::as_str) {
            pending.stashed = Some(reply);
        } else {
            warn!("Dropping reply nobody awaits: {:?}", reply.get(ID_FIELD));
        }
    }

    /// Tag `body` with a fresh id, send it, and wait for the matching reply.
    ///
    /// Fails with `NoResponse` when the budget runs out or the bridge stops
    /// or closes its output first.
    pub async fn send_and_await(&self, mut body: Message, policy: TimeoutPolicy) -> Result<Message> {
        let _turn = self.request_gate.lock().await;

        let id = self.ids.next();
        body.insert(ID_FIELD.into(), Value::String(id.clone()));
        let line = encode(&body)?;

        self.pending().id = Some(id.clone());
        let _pending = PendingGuard(self);

        self.transport.write_line(&line).await?;

        let deadline = Instant::now() + policy.total;
        loop {
            if let Some(reply) = self.take_stashed() {
                return Ok(reply);
            }
            if !self.transport.is_running() {
                debug!("Bridge stopped while awaiting {}", id);
                return Err(BridgeError::NoResponse);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("No reply to {} within {:?}", id, policy.total);
                return Err(BridgeError::NoResponse);
            }
            let wait = policy.slice.min(deadline - now);

            let Ok(mut reader) = timeout(wait, self.transport.reader()).await else {
                continue;
            };
            // An event poller may have stashed the reply while we queued for the reader
            if let Some(reply) = self.take_stashed() {
                return Ok(reply);
            }
            match reader.read_line(wait).await {
                ReadOutcome::Line(bytes) => {
                    let Some(msg) = decode(&bytes) else {
                        continue;
                    };
                    match classify(&msg, Some(id.as_str())) {
                        Disposition::Reply => {
                            debug!("Reply for {}", id);
                            return Ok(msg);
                        }
                        Disposition::Event => self.events.push(msg),
                        Disposition::Unmatched => {
                            warn!(
                                "Dropping reply for {:?} while awaiting {}",
                                msg.get(ID_FIELD),
                                id
                            );
                        }
                    }
                }
                ReadOutcome::Idle => {}
                ReadOutcome::Closed => self.transport.mark_closed(),
            }
        }
    }

    /// One polling step for events.
    ///
    /// Pops the queue head if there is one; otherwise reads at most one line
    /// within `slice`. An event read here is handed straight to the caller
    /// (the queue is empty under the reader lock, so this is the same as
    /// queueing and popping it). A reply for the pending request is stashed
    /// for its waiter.
    pub async fn poll_next(&self, slice: Duration) -> Option<Message> {
        if let Some(event) = self.events.try_pop() {
            return Some(event);
        }
        let mut reader = timeout(slice, self.transport.reader()).await.ok()?;
        // Queued while we waited for the reader
        if let Some(event) = self.events.try_pop() {
            return Some(event);
        }
        match reader.read_line(slice).await {
            ReadOutcome::Line(bytes) => {
                let msg = decode(&bytes)?;
                match classify(&msg, self.pending_id().as_deref()) {
                    Disposition::Event => Some(msg),
                    Disposition::Reply => {
                        self.stash(msg);
                        None
                    }
                    Disposition::Unmatched => {
                        warn!("Dropping unmatched reply {:?}", msg.get(ID_FIELD));
                        None
                    }
                }
            }
            ReadOutcome::Idle => None,
            ReadOutcome::Closed => {
                self.transport.mark_closed();
                None
            }
        }
    }

    /// Poll for an event for up to `total`, in slices of at most `slice`.
    ///
    /// Returns early once the bridge is gone and nothing is queued.
    pub async fn poll_event(&self, total: Duration, slice: Duration) -> Option<Message> {
        let deadline = Instant::now() + total;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(event) = self.poll_next(slice.min(remaining)).await {
                return Some(event);
            }
            if remaining.is_zero() || (!self.transport.is_running() && self.events.is_empty()) {
                return None;
            }
        }
    }
}
