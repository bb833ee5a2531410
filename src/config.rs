//! Relay configuration loaded from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:8080,http://127.0.0.1:8080";
pub const DEFAULT_KEEPALIVE_SECS: u64 = 60;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Shared HMAC secret used to verify bearer tokens
    pub jwt_secret: Vec<u8>,
    /// Required `aud` claim; any audience is accepted when unset
    pub jwt_audience: Option<String>,
    pub bind_addr: SocketAddr,
    /// Origins allowed to upgrade, compared case-insensitively
    pub allowed_origins: Vec<String>,
    /// Read deadline; extended by every inbound frame including pongs
    pub keepalive_window: Duration,
    pub ping_interval: Duration,
    /// Capacity of each connection's outbound queue
    pub outbound_capacity: usize,
    pub static_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl RelayConfig {
    /// Load config from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through an arbitrary variable lookup.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let jwt_secret = get("RELAY_JWT_SECRET")
            .ok_or(ConfigError::Missing("RELAY_JWT_SECRET"))?
            .into_bytes();

        let bind_raw = get("RELAY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Invalid {
                var: "RELAY_BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        let allowed_origins =
            parse_origins(&get("RELAY_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.into()));

        let keepalive_window = Duration::from_secs(parse_positive(
            "RELAY_KEEPALIVE_SECS",
            get("RELAY_KEEPALIVE_SECS"),
            DEFAULT_KEEPALIVE_SECS,
        )?);
        let ping_interval = Duration::from_secs(parse_positive(
            "RELAY_PING_INTERVAL_SECS",
            get("RELAY_PING_INTERVAL_SECS"),
            DEFAULT_PING_INTERVAL_SECS,
        )?);
        let outbound_capacity = parse_positive(
            "RELAY_OUTBOUND_CAPACITY",
            get("RELAY_OUTBOUND_CAPACITY"),
            DEFAULT_OUTBOUND_CAPACITY as u64,
        )? as usize;

        Ok(Self {
            jwt_secret,
            jwt_audience: get("RELAY_JWT_AUDIENCE"),
            bind_addr,
            allowed_origins,
            keepalive_window,
            ping_interval,
            outbound_capacity,
            static_dir: get("RELAY_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            log_file: get("RELAY_LOG_FILE").map(PathBuf::from),
        })
    }

    /// Log the effective settings. Called once logging is up.
    pub fn log_summary(&self) {
        tracing::info!(
            "Relay config: bind {}, origins {:?}, keepalive {}s, ping every {}s, queue capacity {}",
            self.bind_addr,
            self.allowed_origins,
            self.keepalive_window.as_secs(),
            self.ping_interval.as_secs(),
            self.outbound_capacity
        );
        if let Some(audience) = &self.jwt_audience {
            tracing::info!("Tokens must carry audience {}", audience);
        }

        if self.ping_interval >= self.keepalive_window {
            tracing::warn!(
                "Ping interval is not shorter than the keepalive window; idle clients will be evicted between probes"
            );
        }
    }

    /// Config with defaults and the given secret (used by tests and embedders)
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: secret.into(),
            jwt_audience: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            keepalive_window: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            static_dir: PathBuf::from("static"),
            log_file: None,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

fn parse_positive(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(v) => Ok(v),
        Err(e) => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: e.to_string(),
        }),
    }
}
