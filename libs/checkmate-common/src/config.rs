// Harness configuration
//
// Defaults, then an optional JSON file, then CHECKMATE_* environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Wall-clock budget for module-level code and for each call
    pub timeout_ms: u64,
    /// How long a cancelled worker may take to acknowledge before it is abandoned
    pub cancel_grace_ms: u64,
    pub recursion_limit: usize,
    /// Stack reserved for the interpreter thread inside each sandbox process
    pub worker_stack_mb: usize,
    pub max_source_bytes: usize,
    pub max_literal_bytes: usize,
    /// Sandbox executable; looked up next to the running binary, then on PATH, when unset
    pub sandbox_path: Option<PathBuf>,
    /// Budget for a fresh sandbox to load the interpreter and report ready
    pub startup_timeout_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            cancel_grace_ms: 200,
            recursion_limit: 1000,
            worker_stack_mb: 256,
            max_source_bytes: 1024 * 1024,
            max_literal_bytes: 1024 * 1024,
            sandbox_path: None,
            startup_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

const ENV_TIMEOUT_MS: &str = "CHECKMATE_TIMEOUT_MS";
const ENV_RECURSION_LIMIT: &str = "CHECKMATE_RECURSION_LIMIT";
const ENV_CANCEL_GRACE_MS: &str = "CHECKMATE_CANCEL_GRACE_MS";
const ENV_WORKER_STACK_MB: &str = "CHECKMATE_WORKER_STACK_MB";
const ENV_SANDBOX: &str = "CHECKMATE_SANDBOX";
const ENV_STARTUP_TIMEOUT_MS: &str = "CHECKMATE_STARTUP_TIMEOUT_MS";
const SANDBOX_BINARY: &str = "checkmate-sandbox";

impl HarnessConfig {
    /// Load configuration: defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key, value })
        }

        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = parse(ENV_TIMEOUT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_RECURSION_LIMIT) {
            self.recursion_limit = parse(ENV_RECURSION_LIMIT, value)?;
        }
        if let Some(value) = lookup(ENV_CANCEL_GRACE_MS) {
            self.cancel_grace_ms = parse(ENV_CANCEL_GRACE_MS, value)?;
        }
        if let Some(value) = lookup(ENV_WORKER_STACK_MB) {
            self.worker_stack_mb = parse(ENV_WORKER_STACK_MB, value)?;
        }
        if let Some(value) = lookup(ENV_SANDBOX) {
            self.sandbox_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_STARTUP_TIMEOUT_MS) {
            self.startup_timeout_ms = parse(ENV_STARTUP_TIMEOUT_MS, value)?;
        }
        Ok(())
    }

    /// The sandbox executable to spawn
    pub fn sandbox_program(&self) -> PathBuf {
        if let Some(path) = &self.sandbox_path {
            return path.clone();
        }
        let file_name = format!("{}{}", SANDBOX_BINARY, std::env::consts::EXE_SUFFIX);
        // Test executables live one level below the bin directory (target/<profile>/deps)
        std::env::current_exe()
            .ok()
            .and_then(|exe| {
                exe.ancestors()
                    .skip(1)
                    .take(2)
                    .map(|dir| dir.join(&file_name))
                    .find(|candidate| candidate.is_file())
            })
            .unwrap_or_else(|| PathBuf::from(file_name))
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}
