//! Console configuration: compile-time defaults with runtime overrides. The
//! runtime values come from command-line arguments or their `GES_*`
//! environment fallbacks, so a packaged binary can point at another service
//! without rebuilding. Configuration values are public; do not store secrets here.

use std::{env, path::PathBuf, time::Duration};

/// Default request timeout applied by the dispatcher.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const SESSION_FILE_NAME: &str = "session.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub timeout: Duration,
}

impl AppConfig {
    /// Loads compile-time defaults and applies the provided runtime overrides.
    #[must_use]
    pub fn load(runtime: RuntimeConfig) -> Self {
        let api_base_url = option_env!("GES_API_BASE_URL").unwrap_or(DEFAULT_API_BASE_URL);

        let mut config = Self {
            api_base_url: api_base_url.to_string(),
            session_file: default_session_file(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        };

        apply_runtime_overrides(&mut config, runtime);

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::load(RuntimeConfig::default())
    }
}

/// Values supplied at run time; `None` keeps the compile-time default.
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    pub api_base_url: Option<String>,
    pub session_file: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl RuntimeConfig {
    /// Builds runtime values, dropping blank strings.
    #[must_use]
    pub fn new(
        api_base_url: Option<&str>,
        session_file: Option<&str>,
        timeout_seconds: Option<u64>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.and_then(normalize_runtime_value),
            session_file: session_file.and_then(normalize_runtime_value),
            timeout_seconds: timeout_seconds.filter(|seconds| *seconds > 0),
        }
    }
}

fn apply_runtime_overrides(config: &mut AppConfig, runtime: RuntimeConfig) {
    if let Some(value) = runtime.api_base_url {
        config.api_base_url = value;
    }
    if let Some(value) = runtime.session_file {
        config.session_file = PathBuf::from(value);
    }
    if let Some(value) = runtime.timeout_seconds {
        config.timeout = Duration::from_secs(value);
    }
}

fn normalize_runtime_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `$XDG_STATE_HOME/ges-console`, then `$HOME/.local/state/ges-console`,
/// then the working directory.
fn default_session_file() -> PathBuf {
    let state_home = env::var("XDG_STATE_HOME")
        .ok()
        .and_then(|value| normalize_runtime_value(&value))
        .map(PathBuf::from)
        .or_else(|| {
            env::var("HOME")
                .ok()
                .and_then(|value| normalize_runtime_value(&value))
                .map(|home| PathBuf::from(home).join(".local").join("state"))
        });

    match state_home {
        Some(dir) => dir.join(env!("CARGO_PKG_NAME")).join(SESSION_FILE_NAME),
        None => PathBuf::from(".ges-session.json"),
    }
}
