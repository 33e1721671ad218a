//! Server configuration, with environment overrides.

use std::time::Duration;

use bingo_game::SessionConfig;

/// A setting that was present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not valid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything needed to run one engine process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// How often each connection is probed with `PING`. A connection that
    /// hasn't answered the previous probe by the next tick is closed.
    pub heartbeat_interval: Duration,
    /// How long a client may take to complete the WebSocket upgrade.
    pub handshake_timeout: Duration,
    /// Name under which this process reports liveness to the store.
    pub service_name: String,
    /// How often the liveness record is rewritten.
    pub service_heartbeat_interval: Duration,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            service_name: "game-service".to_string(),
            service_heartbeat_interval: Duration::from_secs(30),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `BINGO_*` environment variables.
    ///
    /// | variable | setting |
    /// |---|---|
    /// | `BINGO_BIND_ADDR` | `bind_addr` |
    /// | `BINGO_HEARTBEAT_SECS` | `heartbeat_interval` |
    /// | `BINGO_DISCONNECT_GRACE_SECS` | `session.disconnect_grace` |
    /// | `BINGO_COOLDOWN_SECS` | `session.bingo_cooldown` |
    /// | `BINGO_SERVICE_NAME` | `service_name` |
    /// | `BINGO_SERVICE_HEARTBEAT_SECS` | `service_heartbeat_interval` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("BINGO_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(name) = lookup("BINGO_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Some(secs) = seconds(&lookup, "BINGO_HEARTBEAT_SECS")? {
            config.heartbeat_interval = secs;
        }
        if let Some(secs) = seconds(&lookup, "BINGO_DISCONNECT_GRACE_SECS")? {
            config.session.disconnect_grace = secs;
        }
        if let Some(secs) = seconds(&lookup, "BINGO_COOLDOWN_SECS")? {
            config.session.bingo_cooldown = secs;
        }
        if let Some(secs) = seconds(&lookup, "BINGO_SERVICE_HEARTBEAT_SECS")? {
            config.service_heartbeat_interval = secs;
        }

        Ok(config)
    }
}

/// Reads a whole number of seconds. Zero is refused: every interval here
/// drives a timer.
fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    let secs: u64 = value.trim().parse().map_err(|e: std::num::ParseIntError| {
        ConfigError::Invalid {
            var,
            value: value.clone(),
            reason: e.to_string(),
        }
    })?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be at least 1".into(),
        });
    }
    Ok(Some(Duration::from_secs(secs)))
}
