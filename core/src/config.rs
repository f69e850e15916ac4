//! Settings for both dispatchers.
//!
//! # Design
//! Every value has a usable default matching a stock Joplin desktop install.
//! `from_env` reads overrides through `from_lookup`, which takes the lookup
//! as a closure so tests never touch the process environment. Malformed
//! numbers are rejected rather than silently replaced by defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::error::{ApiError, Result};

pub const DEFAULT_PORT: u16 = 41184;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BINARY: &str = "joplin";

/// Connection settings for the WebClipper service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, without trailing slash.
    pub host: String,
    /// API token from the WebClipper options page.
    pub token: String,
    /// Per-request timeout. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            host: default_host(DEFAULT_PORT),
            token: token.into(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.trim_end_matches('/').to_string();
        self
    }

    /// Point at `127.0.0.1:<port>`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.host = default_host(port);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `JOPLIN_TOKEN`, `JOPLIN_HOST`, `JOPLIN_WEBCLIPPER` and
    /// `JOPLIN_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`. `JOPLIN_HOST`
    /// wins over `JOPLIN_WEBCLIPPER` when both are set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new(lookup("JOPLIN_TOKEN").unwrap_or_default());
        if let Some(port) = lookup("JOPLIN_WEBCLIPPER") {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::invalid(format!("JOPLIN_WEBCLIPPER is not a port: {port:?}")))?;
            config = config.with_port(port);
        }
        if let Some(host) = lookup("JOPLIN_HOST") {
            config = config.with_host(host.trim());
        }
        if let Some(secs) = lookup("JOPLIN_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| ApiError::invalid(format!("JOPLIN_TIMEOUT_SECS is not a number: {secs:?}")))?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn default_host(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Where the `joplin` binary lives and which profile it operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub binary: PathBuf,
    pub profile: PathBuf,
}

/// `joplin` from `PATH`, profile in `~/.config/joplin`. Without a home
/// directory the profile falls back to `.config/joplin` under the working
/// directory and a warning is logged; set `profile` or `JOPLIN_PROFILE` to
/// avoid that.
impl Default for CliConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY, default_profile())
    }
}

impl CliConfig {
    pub fn new(binary: impl Into<PathBuf>, profile: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            profile: profile.into(),
        }
    }

    /// Defaults overridden by `JOPLIN_BIN` and `JOPLIN_PROFILE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let binary = lookup("JOPLIN_BIN").map_or_else(|| PathBuf::from(DEFAULT_BINARY), PathBuf::from);
        let profile = lookup("JOPLIN_PROFILE").map_or_else(default_profile, PathBuf::from);
        Self { binary, profile }
    }
}

/// The desktop and terminal apps both keep their profile in `~/.config/joplin`.
fn default_profile() -> PathBuf {
    profile_under(dirs::home_dir())
}

fn profile_under(home: Option<PathBuf>) -> PathBuf {
    let relative = Path::new(".config").join("joplin");
    match home {
        Some(home) => home.join(relative),
        None => {
            warn!(profile = %relative.display(), "no home directory; joplin profile is relative to the working directory");
            relative
        }
    }
}
