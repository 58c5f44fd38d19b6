//! Process launchers
//!
//! Spawning is identical everywhere (tokio's `Command` hides the OS
//! differences), but asking a child to exit is not: unix has SIGTERM,
//! other targets only have a forceful kill. Each launcher pairs a spawn
//! strategy with a termination strategy behind `ProcessLauncher`.

use crate::config::BridgeConfig;
use async_trait::async_trait;
use fedichess_core::{BridgeError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Creates and terminates bridge processes
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the bridge with stdin/stdout piped
    fn spawn(&self, config: &BridgeConfig) -> Result<Child>;

    /// Ask the child to exit, waiting up to `grace` before forcing it.
    /// A child that has already exited is not an error.
    async fn terminate(&self, child: &mut Child, grace: Duration) -> Result<()>;
}

/// Launcher for the build target
#[cfg(unix)]
pub type PlatformLauncher = SignalLauncher;

/// Launcher for the build target
#[cfg(not(unix))]
pub type PlatformLauncher = KillLauncher;

/// Build the command line for the bridge.
///
/// A `.js` program is run as `<script_runtime> <program> <args..>`.
pub fn bridge_command(config: &BridgeConfig) -> Command {
    let mut cmd = if config.is_script() {
        let mut c = Command::new(&config.script_runtime);
        c.arg(&config.program);
        c
    } else {
        Command::new(&config.program)
    };
    cmd.args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(if config.inherit_stderr {
            Stdio::inherit()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

fn spawn_command(mut cmd: Command, config: &BridgeConfig) -> Result<Child> {
    let child = cmd.spawn().map_err(|e| {
        BridgeError::LaunchFailed(format!("{}: {}", config.program.display(), e))
    })?;
    info!(
        "Spawned bridge {} (pid {:?})",
        config.program.display(),
        child.id()
    );
    Ok(child)
}

/// Kill and reap, bounded by `grace`
async fn force_kill(child: &mut Child, grace: Duration) -> Result<()> {
    match tokio::time::timeout(grace, child.kill()).await {
        Ok(Ok(())) => {
            debug!("Bridge killed");
            Ok(())
        }
        Ok(Err(e)) => Err(BridgeError::ProcessError(format!("kill failed: {}", e))),
        Err(_) => {
            warn!("Bridge did not exit within {:?} of kill", grace);
            Ok(())
        }
    }
}

/// SIGTERM first, SIGKILL if the child lingers
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalLauncher;

#[cfg(unix)]
#[async_trait]
impl ProcessLauncher for SignalLauncher {
    fn spawn(&self, config: &BridgeConfig) -> Result<Child> {
        spawn_command(bridge_command(config), config)
    }

    async fn terminate(&self, child: &mut Child, grace: Duration) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        // None once the child has been reaped
        let Some(pid) = child.id() else {
            return Ok(());
        };

        debug!("Sending SIGTERM to bridge {}", pid);
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(()),
            Err(e) => {
                warn!("SIGTERM to {} failed: {}, killing", pid, e);
                return force_kill(child, grace).await;
            }
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Bridge {} exited: {}", pid, status);
                Ok(())
            }
            Ok(Err(e)) => Err(BridgeError::ProcessError(format!("wait failed: {}", e))),
            Err(_) => {
                warn!("Bridge {} ignored SIGTERM for {:?}, killing", pid, grace);
                force_kill(child, grace).await
            }
        }
    }
}

/// Forceful kill only; the fallback where no termination signal exists
#[derive(Debug, Default, Clone, Copy)]
pub struct KillLauncher;

#[async_trait]
impl ProcessLauncher for KillLauncher {
    fn spawn(&self, config: &BridgeConfig) -> Result<Child> {
        #[allow(unused_mut)]
        let mut cmd = bridge_command(config);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        spawn_command(cmd, config)
    }

    async fn terminate(&self, child: &mut Child, grace: Duration) -> Result<()> {
        if child.id().is_none() {
            return Ok(());
        }
        force_kill(child, grace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_runs_through_runtime() {
        let config = BridgeConfig::new("dist/index.js")
            .with_script_runtime("node18")
            .with_args(["--lobby"]);
        let cmd = bridge_command(&config);
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "node18");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, ["dist/index.js", "--lobby"]);
    }

    #[test]
    fn executable_runs_directly() {
        let config = BridgeConfig::new("/usr/bin/fedichess-bridge").with_working_dir("/tmp");
        let cmd = bridge_command(&config);
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "/usr/bin/fedichess-bridge");
        assert_eq!(std_cmd.get_args().count(), 0);
        assert_eq!(
            std_cmd.get_current_dir(),
            Some(std::path::Path::new("/tmp"))
        );
    }

    #[tokio::test]
    async fn missing_executable_is_launch_failure() {
        let config = BridgeConfig::new("/definitely/not/a/bridge-binary");
        let err = PlatformLauncher::default().spawn(&config).unwrap_err();
        assert!(matches!(err, BridgeError::LaunchFailed(_)), "{err}");
    }
}
