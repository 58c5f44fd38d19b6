//! Line transport over a child process's stdin/stdout
//!
//! The transport owns the bridge process and both pipe ends. A pump task
//! splits the child's stdout into lines and forwards them, in order, over
//! an unbounded channel; `read_line` is a bounded wait on that channel, so
//! a caller is never parked past its deadline and a timed-out read never
//! loses a partially received line.
//!
//! Writes go through one mutex so concurrent callers never interleave
//! partial lines. Reads go through another (`reader()`), which callers hold
//! across decode-and-classify so only one line is in flight at a time.

use crate::config::BridgeConfig;
use crate::launcher::{PlatformLauncher, ProcessLauncher};
use fedichess_core::{BridgeError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of one bounded read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, without its terminator
    Line(Vec<u8>),
    /// Nothing arrived before the deadline
    Idle,
    /// The child closed its stdout (or was never started)
    Closed,
}

/// Read side of the transport; obtain it with [`LineTransport::reader`]
#[derive(Debug, Default)]
pub struct LineReader {
    lines: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl LineReader {
    /// Next line, waiting at most `wait`.
    ///
    /// A line that is already buffered is returned even when `wait` is zero.
    pub async fn read_line(&mut self, wait: Duration) -> ReadOutcome {
        let Some(lines) = self.lines.as_mut() else {
            return ReadOutcome::Closed;
        };
        match tokio::time::timeout(wait, lines.recv()).await {
            Ok(Some(line)) => ReadOutcome::Line(line),
            Ok(None) => {
                self.lines = None;
                ReadOutcome::Closed
            }
            Err(_) => ReadOutcome::Idle,
        }
    }
}

/// Owns the bridge process and its pipes
pub struct LineTransport {
    config: BridgeConfig,
    launcher: Arc<dyn ProcessLauncher>,
    running: AtomicBool,
    /// Serializes start/stop against each other
    lifecycle: Mutex<()>,
    child: Mutex<Option<Child>>,
    writer: Mutex<Option<ChildStdin>>,
    reader: Mutex<LineReader>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl LineTransport {
    /// Transport using the launcher for the build target
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_launcher(config, Arc::new(PlatformLauncher::default()))
    }

    pub fn with_launcher(config: BridgeConfig, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            config,
            launcher,
            running: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            child: Mutex::new(None),
            writer: Mutex::new(None),
            reader: Mutex::new(LineReader::default()),
            pump: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// True between a successful `start` and `stop` or end of stream
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Process id of the current child, if one is held
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(Child::id)
    }

    /// Spawn the bridge and wire up its pipes.
    ///
    /// Leftovers of a bridge that exited on its own are released first, so
    /// a transport can be restarted after end of stream or `stop`.
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_running() {
            return Err(BridgeError::AlreadyStarted);
        }
        self.release().await;

        // On any early return the child is dropped, and kill_on_drop reaps it
        let mut child = self.launcher.spawn(&self.config)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::LaunchFailed("No stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::LaunchFailed("No stdout".into()))?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_lines(stdout, line_tx));

        *self.writer.lock().await = Some(stdin);
        self.reader.lock().await.lines = Some(line_rx);
        *self.pump.lock().await = Some(pump);
        *self.child.lock().await = Some(child);
        self.running.store(true, Ordering::SeqCst);

        info!("Bridge transport started");
        Ok(())
    }

    /// Write one line; the newline is appended here.
    pub async fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let stdin = guard.as_mut().ok_or(BridgeError::NotStarted)?;
        if !self.is_running() {
            return Err(BridgeError::WriteFailed("bridge closed its output".into()));
        }

        let preview: String = line.chars().take(200).collect();
        debug!("[Client→Bridge] len={} json={}", line.len(), preview);

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        stdin
            .write_all(&buf)
            .await
            .map_err(|e| BridgeError::WriteFailed(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| BridgeError::WriteFailed(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    /// Exclusive access to the read side.
    ///
    /// Hold the guard across decode-and-classify of the line it yields.
    pub async fn reader(&self) -> MutexGuard<'_, LineReader> {
        self.reader.lock().await
    }

    /// Read one line with a deadline, marking the transport closed on EOF
    pub async fn read_line(&self, wait: Duration) -> ReadOutcome {
        let outcome = self.reader().await.read_line(wait).await;
        if outcome == ReadOutcome::Closed {
            self.mark_closed();
        }
        outcome
    }

    /// Record end of stream
    pub fn mark_closed(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            warn!("Bridge closed its output");
        }
    }

    /// Terminate the child, reap it and close both pipes.
    ///
    /// Idempotent, and a no-op on a transport that never started.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping bridge transport");
        }
        self.release().await;
    }

    async fn release(&self) {
        // Kill before touching the writer: a write blocked on a full pipe
        // only returns once the child is gone.
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            if let Err(e) = self
                .launcher
                .terminate(&mut child, self.config.stop_grace)
                .await
            {
                warn!("Bridge termination: {}", e);
            }
        }
        if let Some(mut stdin) = self.writer.lock().await.take() {
            let _ = stdin.shutdown().await;
        }
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
    }
}

impl Drop for LineTransport {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
        if let Some(child) = self.child.get_mut().as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Forward stdout lines into `lines` until EOF or a read error
async fn pump_lines(stdout: ChildStdout, lines: mpsc::UnboundedSender<Vec<u8>>) {
    let mut reader = BufReader::new(stdout);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!("Bridge stdout reached EOF");
                break;
            }
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let preview: String = String::from_utf8_lossy(&line).chars().take(200).collect();
                debug!("[Bridge→Client] len={} json={}", line.len(), preview);
                if lines.send(line).is_err() {
                    debug!("Line receiver dropped, pump exiting");
                    break;
                }
            }
            Err(e) => {
                error!("Bridge stdout read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unstarted_transport_is_inert() {
        let transport = LineTransport::new(BridgeConfig::new("unused"));
        assert!(!transport.is_running());
        assert_eq!(
            transport.read_line(Duration::from_millis(10)).await,
            ReadOutcome::Closed
        );
        assert!(matches!(
            transport.write_line("{}").await,
            Err(BridgeError::NotStarted)
        ));
        transport.stop().await;
        transport.stop().await;
        assert!(!transport.is_running());
    }

    #[tokio::test]
    async fn launch_failure_leaves_nothing_open() {
        let transport = LineTransport::new(BridgeConfig::new("/definitely/not/a/bridge-binary"));
        let err = transport.start().await.unwrap_err();
        assert!(matches!(err, BridgeError::LaunchFailed(_)));
        assert!(!transport.is_running());
        assert!(transport.pid().await.is_none());
        assert!(transport.writer.lock().await.is_none());
    }

    #[tokio::test]
    async fn reader_returns_buffered_lines_then_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut reader = LineReader { lines: Some(rx) };
        tx.send(b"one".to_vec()).unwrap();
        tx.send(b"two".to_vec()).unwrap();
        drop(tx);

        assert_eq!(
            reader.read_line(Duration::ZERO).await,
            ReadOutcome::Line(b"one".to_vec())
        );
        assert_eq!(
            reader.read_line(Duration::ZERO).await,
            ReadOutcome::Line(b"two".to_vec())
        );
        assert_eq!(reader.read_line(Duration::ZERO).await, ReadOutcome::Closed);
        assert!(reader.lines.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reader_idles_until_deadline() {
        let (_tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut reader = LineReader { lines: Some(rx) };
        let started = tokio::time::Instant::now();
        assert_eq!(
            reader.read_line(Duration::from_millis(250)).await,
            ReadOutcome::Idle
        );
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
