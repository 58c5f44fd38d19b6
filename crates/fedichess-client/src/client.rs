//! Public client API

use crate::config::{BridgeConfig, TimeoutPolicy};
use crate::correlator::Correlator;
use crate::launcher::ProcessLauncher;
use crate::transport::LineTransport;
use fedichess_core::{BridgeEvent, Command, Message, Reply, Result};
use futures::Stream;
use futures::stream;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Client for a FediChess bridge process
///
/// All operations take `&self`; share one client between tasks with `Arc`.
/// Requests are answered one at a time, and failures come back as error
/// replies (`ok: false`) rather than panics or `Err`s.
pub struct BridgeClient {
    correlator: Correlator,
    policy: TimeoutPolicy,
}

impl BridgeClient {
    /// Client using the launcher for the build target. Nothing is spawned
    /// until [`start_bridge`](Self::start_bridge).
    pub fn new(config: BridgeConfig) -> Self {
        let policy = config.timeout_policy();
        Self {
            correlator: Correlator::new(LineTransport::new(config)),
            policy,
        }
    }

    /// Client with a custom process launcher
    pub fn with_launcher(config: BridgeConfig, launcher: Arc<dyn ProcessLauncher>) -> Self {
        let policy = config.timeout_policy();
        Self {
            correlator: Correlator::new(LineTransport::with_launcher(config, launcher)),
            policy,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        self.correlator.transport().config()
    }

    pub fn is_running(&self) -> bool {
        self.correlator.transport().is_running()
    }

    /// OS process id of the running bridge
    pub async fn bridge_pid(&self) -> Option<u32> {
        self.correlator.transport().pid().await
    }

    /// Number of events waiting to be polled
    pub fn pending_events(&self) -> usize {
        self.correlator.events().len()
    }

    /// Spawn the bridge process
    pub async fn start_bridge(&self) -> Result<()> {
        self.correlator.transport().start().await
    }

    /// Send an arbitrary request body and wait for its reply
    pub async fn send_and_await(&self, body: Message, policy: TimeoutPolicy) -> Reply {
        match self.correlator.send_and_await(body, policy).await {
            Ok(msg) => Reply::from_message(msg),
            Err(e) => {
                warn!("Request failed: {}", e);
                Reply::from(e)
            }
        }
    }

    /// Send a typed command with the configured timeouts
    pub async fn command(&self, command: Command) -> Reply {
        let name = command.name();
        match command.into_message() {
            Ok(body) => self.send_and_await(body, self.policy).await,
            Err(e) => {
                warn!("Could not encode {}: {}", name, e);
                Reply::from(e)
            }
        }
    }

    pub async fn join_lobby(&self) -> Reply {
        self.command(Command::JoinLobby).await
    }

    pub async fn leave_lobby(&self) -> Reply {
        self.command(Command::LeaveLobby).await
    }

    pub async fn join_game(&self, game_id: &str) -> Reply {
        self.command(Command::JoinGame {
            game_id: game_id.to_string(),
        })
        .await
    }

    pub async fn leave_game(&self) -> Reply {
        self.command(Command::LeaveGame).await
    }

    /// Send `action` with `payload` to the current room, or to one peer
    pub async fn send(&self, action: &str, payload: serde_json::Value, peer_id: Option<&str>) -> Reply {
        self.command(Command::send(action, payload, peer_id.map(str::to_string)))
            .await
    }

    /// Peers in the current room; empty when the reply has no usable `peers`
    pub async fn get_peers(&self) -> Vec<String> {
        let reply = self.command(Command::GetPeers).await;
        if let Some(err) = reply.error() {
            warn!("getPeers failed: {}", err);
        }
        reply.peers()
    }

    /// Next event, waiting up to `timeout`; `None` if nothing arrives
    pub async fn poll_event(&self, timeout: Duration) -> Option<Message> {
        self.correlator.poll_event(timeout, self.policy.slice).await
    }

    /// Like [`poll_event`](Self::poll_event), as a typed view. Events whose
    /// `event` field is not a string are skipped.
    pub async fn poll_bridge_event(&self, timeout: Duration) -> Option<BridgeEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let msg = self.poll_event(remaining).await?;
            if let Some(event) = BridgeEvent::from_message(&msg) {
                return Some(event);
            }
            warn!("Skipping event with non-string kind: {:?}", msg.get("event"));
        }
    }

    /// Up to `max` typed events, each waited for at most `wait`.
    ///
    /// Stops early at the first wait that yields nothing.
    pub async fn drain_bridge_events(&self, max: usize, wait: Duration) -> Vec<BridgeEvent> {
        let mut drained = Vec::new();
        while drained.len() < max {
            match self.poll_bridge_event(wait).await {
                Some(event) => drained.push(event),
                None => break,
            }
        }
        drained
    }

    /// Events in arrival order, one poll slice at a time.
    ///
    /// The stream ends once the bridge has stopped (or closed its output)
    /// and everything queued has been yielded. Wrap `next()` in
    /// `tokio::time::timeout` to bound a wait.
    pub fn events(&self) -> impl Stream<Item = Message> + '_ {
        stream::unfold(self, |client| async move {
            loop {
                if let Some(event) = client.poll_event(client.policy.slice).await {
                    return Some((event, client));
                }
                if !client.is_running() && client.pending_events() == 0 {
                    return None;
                }
            }
        })
    }

    /// Stop the bridge. Safe to call repeatedly or before `start_bridge`.
    pub async fn stop(&self) {
        self.correlator.transport().stop().await;
        let dropped = self.correlator.events().clear();
        if dropped > 0 {
            info!("Discarded {} unread events on stop", dropped);
        }
    }
}
