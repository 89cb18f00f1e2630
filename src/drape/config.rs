//! Configuration for Drape.
//!
//! [`StudioConfig`] is a plain struct. Build it by hand, start from [`Default`], or read it
//! from the process environment with [`StudioConfig::from_env`]. No config-file formats are
//! involved.
//!
//! # Example
//!
//! ```rust
//! use drape::config::{ReferenceMode, StudioConfig};
//! use std::time::Duration;
//!
//! let config = StudioConfig {
//!     api_token: "r8_test".into(),
//!     generation_timeout: Duration::from_secs(90),
//!     reference_mode: ReferenceMode::Hosted,
//!     ..StudioConfig::default()
//! };
//! assert_eq!(config.api_base, "https://api.replicate.com/v1");
//! ```

use crate::drape::error::StudioError;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Replicate's public API root.
pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
/// Address `drape serve` listens on unless `DRAPE_BIND` says otherwise.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
/// Upper bound for one generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
/// Pause between files in a bulk gallery download.
pub const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_millis(300);

/// How images are handed to the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    /// Embed each image as a base64 data URL.
    #[default]
    Inline,
    /// Upload each image through the relay and pass the hosted URL.
    Hosted,
}

impl FromStr for ReferenceMode {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(ReferenceMode::Inline),
            "hosted" | "upload" => Ok(ReferenceMode::Hosted),
            other => Err(StudioError::Config(format!(
                "unknown image reference mode '{}' (expected inline or hosted)",
                other
            ))),
        }
    }
}

/// Everything a Drape server or batch run needs to know.
#[derive(Clone)]
pub struct StudioConfig {
    /// Username accepted by `/api/auth`.
    pub auth_username: String,
    /// Password accepted by `/api/auth`.
    pub auth_password: String,
    /// Bearer token for the generation service.
    pub api_token: String,
    /// API root of the generation service, without a trailing slash.
    pub api_base: String,
    /// Listen address for `drape serve`.
    pub bind_addr: SocketAddr,
    /// Upper bound for one generation call, uploads included.
    pub generation_timeout: Duration,
    /// Inline data URLs or relay uploads.
    pub reference_mode: ReferenceMode,
    /// Pause between files in a bulk gallery download.
    pub download_delay: Duration,
}

impl Default for StudioConfig {
    /// Empty credentials, Replicate defaults, inline references.
    fn default() -> Self {
        Self {
            auth_username: String::new(),
            auth_password: String::new(),
            api_token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 3000))),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            reference_mode: ReferenceMode::Inline,
            download_delay: DEFAULT_DOWNLOAD_DELAY,
        }
    }
}

impl StudioConfig {
    /// Read configuration from the process environment.
    ///
    /// Required: `AUTH_USERNAME`, `AUTH_PASSWORD`, `REPLICATE_API_TOKEN`.
    /// Optional: `REPLICATE_API_BASE`, `DRAPE_BIND`, `DRAPE_GENERATION_TIMEOUT_SECS`,
    /// `DRAPE_IMAGE_REFS`, `DRAPE_DOWNLOAD_DELAY_MS`.
    pub fn from_env() -> Result<Self, StudioError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StudioError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::parse(lookup, true)
    }

    /// Configuration for offline batch runs: only `REPLICATE_API_TOKEN` is required, the
    /// login credentials are left empty.
    pub fn for_batch_from_env() -> Result<Self, StudioError> {
        Self::parse(|key| std::env::var(key).ok(), false)
    }

    fn parse<F>(lookup: F, needs_login: bool) -> Result<Self, StudioError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            non_empty(key).ok_or_else(|| StudioError::Config(format!("{} is not set", key)))
        };

        let mut config = StudioConfig::default();
        if needs_login {
            config.auth_username = required("AUTH_USERNAME")?;
            config.auth_password = required("AUTH_PASSWORD")?;
        }
        config.api_token = required("REPLICATE_API_TOKEN")?;

        if let Some(base) = non_empty("REPLICATE_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(bind) = non_empty("DRAPE_BIND") {
            config.bind_addr = bind
                .parse()
                .map_err(|e| StudioError::Config(format!("DRAPE_BIND '{}': {}", bind, e)))?;
        }
        if let Some(secs) = non_empty("DRAPE_GENERATION_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                StudioError::Config(format!("DRAPE_GENERATION_TIMEOUT_SECS '{}'", secs))
            })?;
            config.generation_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(mode) = non_empty("DRAPE_IMAGE_REFS") {
            config.reference_mode = mode.parse()?;
        }
        if let Some(ms) = non_empty("DRAPE_DOWNLOAD_DELAY_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| StudioError::Config(format!("DRAPE_DOWNLOAD_DELAY_MS '{}'", ms)))?;
            config.download_delay = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

impl fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfig")
            .field("auth_username", &self.auth_username)
            .field("auth_password", &"<redacted>")
            .field("api_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("bind_addr", &self.bind_addr)
            .field("generation_timeout", &self.generation_timeout)
            .field("reference_mode", &self.reference_mode)
            .field("download_delay", &self.download_delay)
            .finish()
    }
}
