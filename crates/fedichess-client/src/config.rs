//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the bridge executable or entry script
pub const ENV_BRIDGE: &str = "FEDICHESS_BRIDGE";
/// Environment variable naming the bridge working directory
pub const ENV_BRIDGE_CWD: &str = "FEDICHESS_BRIDGE_CWD";
/// Environment variable overriding the script interpreter
pub const ENV_NODE: &str = "FEDICHESS_NODE";
/// Environment variable overriding the reply budget, in milliseconds
pub const ENV_REQUEST_TIMEOUT_MS: &str = "FEDICHESS_REQUEST_TIMEOUT_MS";

/// How to launch and talk to the bridge process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge executable, or a `.js` entry point run through `script_runtime`
    pub program: PathBuf,
    /// Extra arguments passed after the program
    pub args: Vec<String>,
    /// Working directory for the child (inherits ours when unset)
    pub working_dir: Option<PathBuf>,
    /// Interpreter for `.js` entry points (default: node)
    pub script_runtime: String,
    /// Pass the child's stderr through to ours; discard it otherwise
    pub inherit_stderr: bool,
    /// Length of one read attempt while waiting
    #[serde(with = "millis")]
    pub poll_slice: Duration,
    /// Overall budget for a reply to arrive
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// How long `stop` waits for a graceful exit before killing
    #[serde(with = "millis")]
    pub stop_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("node"),
            args: Vec::new(),
            working_dir: None,
            script_runtime: "node".into(),
            inherit_stderr: true,
            poll_slice: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            stop_grace: Duration::from_secs(2),
        }
    }
}

impl BridgeConfig {
    /// Config for the given program with default timings
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Build from `FEDICHESS_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(program) = lookup(ENV_BRIDGE).filter(|v| !v.trim().is_empty()) {
            config.program = PathBuf::from(program.trim());
        }
        if let Some(cwd) = lookup(ENV_BRIDGE_CWD).filter(|v| !v.trim().is_empty()) {
            config.working_dir = Some(PathBuf::from(cwd.trim()));
        }
        if let Some(node) = lookup(ENV_NODE).filter(|v| !v.trim().is_empty()) {
            config.script_runtime = node.trim().to_string();
        }
        if let Some(ms) = lookup(ENV_REQUEST_TIMEOUT_MS).and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_millis(ms);
        }
        config
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_script_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.script_runtime = runtime.into();
        self
    }

    pub fn with_inherit_stderr(mut self, inherit: bool) -> Self {
        self.inherit_stderr = inherit;
        self
    }

    pub fn with_poll_slice(mut self, slice: Duration) -> Self {
        self.poll_slice = slice;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Whether `program` is a script that needs `script_runtime`
    pub fn is_script(&self) -> bool {
        is_js(&self.program)
    }

    /// Default timeout policy for requests
    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            slice: self.poll_slice,
            total: self.request_timeout,
        }
    }
}

fn is_js(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("js"))
}

/// Bounds on how long a request waits for its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// One bounded read attempt before re-checking state
    pub slice: Duration,
    /// Overall budget
    pub total: Duration,
}

impl TimeoutPolicy {
    pub fn new(slice: Duration, total: Duration) -> Self {
        Self { slice, total }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        BridgeConfig::default().timeout_policy()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
