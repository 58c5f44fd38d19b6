//! FediChess bridge CLI
//!
//! Drives a bridge process from the command line:
//! - `peers`: join the lobby and list who is there
//! - `watch`: print events as JSON lines
//! - `send`: send one action to the current room or a peer
//! - `lobby`: heartbeat, list peers, and challenge the first one
//!
//! Logs go to stderr; stdout carries only command output.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use fedichess_client::{BridgeClient, BridgeConfig, EventKind, Reply};
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Events logged after the heartbeat before listing peers
const LOBBY_DRAIN_POLLS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "fedichess")]
#[command(about = "Talk to a FediChess bridge over stdio")]
struct Args {
    /// Bridge executable or dist/index.js (default: $FEDICHESS_BRIDGE)
    #[arg(long)]
    bridge: Option<PathBuf>,

    /// Working directory for the bridge (default: $FEDICHESS_BRIDGE_CWD)
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Interpreter for .js bridges (default: $FEDICHESS_NODE or node)
    #[arg(long)]
    node: Option<String>,

    /// Reply timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Join the lobby and print the peer list
    Peers,

    /// Print events as JSON lines
    Watch {
        /// How long to watch
        #[arg(long, default_value = "30")]
        seconds: u64,

        /// Watch a game room instead of the lobby
        #[arg(long)]
        game: Option<String>,
    },

    /// Send one action
    Send {
        /// Action name (heartbeat, chat, move, ...)
        action: String,

        /// JSON payload
        #[arg(default_value = "null")]
        payload: String,

        /// Deliver to one peer only
        #[arg(long)]
        peer: Option<String>,

        /// Send in a game room instead of the lobby
        #[arg(long)]
        game: Option<String>,
    },

    /// Announce ourselves, list peers and challenge the first one
    Lobby {
        /// Display name in heartbeats
        #[arg(long, default_value = "RustCLI")]
        name: String,

        /// Advertised rating
        #[arg(long, default_value = "1200")]
        elo: u32,

        /// Seconds to wait for a challenge response
        #[arg(long, default_value = "10")]
        wait: u64,
    },
}

fn config_from(args: &Args) -> BridgeConfig {
    let mut config = BridgeConfig::from_env();
    if let Some(bridge) = &args.bridge {
        config.program = bridge.clone();
    }
    if let Some(cwd) = &args.cwd {
        config.working_dir = Some(cwd.clone());
    }
    if let Some(node) = &args.node {
        config.script_runtime = node.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    config
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn check(what: &str, reply: Reply) -> Result<Reply> {
    if reply.is_ok() {
        Ok(reply)
    } else {
        bail!("{} failed: {}", what, reply.error().unwrap_or("unknown error"))
    }
}

async fn enter_room(client: &BridgeClient, game: Option<&str>) -> Result<()> {
    match game {
        Some(game_id) => check("joinGame", client.join_game(game_id).await)?,
        None => check("joinLobby", client.join_lobby().await)?,
    };
    Ok(())
}

async fn run(client: &BridgeClient, command: Cmd) -> Result<()> {
    match command {
        Cmd::Peers => {
            enter_room(client, None).await?;
            let peers = client.get_peers().await;
            info!("{} peer(s) in lobby", peers.len());
            for peer in peers {
                println!("{}", peer);
            }
            client.leave_lobby().await;
        }

        Cmd::Watch { seconds, game } => {
            enter_room(client, game.as_deref()).await?;
            let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
            let events = client.events();
            tokio::pin!(events);
            while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.next()).await {
                println!("{}", serde_json::Value::Object(event));
            }
        }

        Cmd::Send {
            action,
            payload,
            peer,
            game,
        } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            enter_room(client, game.as_deref()).await?;
            let reply = check("send", client.send(&action, payload, peer.as_deref()).await)?;
            println!("{}", serde_json::Value::Object(reply.into_message()));
        }

        Cmd::Lobby { name, elo, wait } => {
            enter_room(client, None).await?;
            let my_id = format!("cli-{}", uuid::Uuid::new_v4());

            check(
                "heartbeat",
                client
                    .send(
                        "heartbeat",
                        json!({
                            "id": my_id,
                            "elo": elo,
                            "name": name,
                            "ready": true,
                            "timestamp": timestamp_ms(),
                        }),
                        None,
                    )
                    .await,
            )?;

            for event in client
                .drain_bridge_events(LOBBY_DRAIN_POLLS, Duration::from_millis(500))
                .await
            {
                info!("Event: {} from {:?}", event.kind, event.peer_id);
            }

            let peers = client.get_peers().await;
            println!("Peers in lobby: {:?}", peers);

            if let Some(first_peer) = peers.first() {
                let game_id = uuid::Uuid::new_v4().to_string();
                check(
                    "challenge",
                    client
                        .send(
                            "challenge",
                            json!({
                                "type": "challenge",
                                "gameId": game_id,
                                "challengerId": my_id,
                                "challengerName": name,
                                "challengerElo": elo,
                                "color": "w",
                                "timestamp": timestamp_ms(),
                            }),
                            Some(first_peer),
                        )
                        .await,
                )?;
                println!("Sent challenge to {} gameId {}", first_peer, game_id);

                let deadline = tokio::time::Instant::now() + Duration::from_secs(wait);
                loop {
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    let Some(event) = client.poll_bridge_event(remaining).await else {
                        warn!("No challenge response within {}s", wait);
                        break;
                    };
                    if event.kind == EventKind::ChallengeResponse {
                        println!("challResp: {}", event.payload);
                        break;
                    }
                }
            }

            client.leave_lobby().await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = config_from(&args);
    info!("Bridge: {}", config.program.display());

    let client = BridgeClient::new(config);
    client.start_bridge().await?;

    let outcome = run(&client, args.command).await;
    client.stop().await;
    outcome
}
