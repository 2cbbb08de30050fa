//! TOML configuration file.
//!
//! Every section and key is optional; a missing key takes the default
//! the server would use without a file.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! handshake_timeout_ms = 5000
//!
//! [rooms]
//! connect_timeout_secs = 10
//! expiration_secs = 18000
//!
//! [matchmaking]
//! poll_interval_ms = 1000
//! modes = [{ id = 0, party_size = 2 }, { id = 1, party_size = 4 }]
//!
//! [status]
//! enabled = true
//! path = "/tmp/matchforge_status"
//! interval_ms = 1000
//!
//! [auth]
//! secret = "change-me"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use matchforge_matchmaker::{ModeConfig, SchedulerConfig};
use matchforge_protocol::GameMode;
use matchforge_room::RoomConfig;
use serde::Deserialize;

use crate::StatusConfig;

/// Errors raised while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenSection,
    pub rooms: RoomsSection,
    pub matchmaking: MatchmakingSection,
    pub status: StatusSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenSection {
    pub bind: String,
    /// How long a new connection has to send its handshake.
    pub handshake_timeout_ms: u64,
}

impl Default for ListenSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            handshake_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsSection {
    pub connect_timeout_secs: u64,
    pub expiration_secs: u64,
}

impl Default for RoomsSection {
    fn default() -> Self {
        let defaults = RoomConfig::default();
        Self {
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            expiration_secs: defaults.expiration.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchmakingSection {
    pub poll_interval_ms: u64,
    pub modes: Vec<ModeSection>,
}

impl Default for MatchmakingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            modes: vec![ModeSection {
                id: GameMode::DEFAULT.0,
                party_size: 2,
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModeSection {
    pub id: u32,
    pub party_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    pub enabled: bool,
    pub path: PathBuf,
    pub interval_ms: u64,
}

impl Default for StatusSection {
    fn default() -> Self {
        let defaults = StatusConfig::default();
        Self {
            enabled: true,
            path: defaults.path,
            interval_ms: defaults.interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Shared secret for signed identity tokens. Without one the server
    /// trusts whatever identity the client claims.
    pub secret: Option<String>,
}

impl ServerConfig {
    /// Reads and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses and validates configuration text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind is empty".into()));
        }
        if self.matchmaking.modes.is_empty() {
            return Err(ConfigError::Invalid(
                "matchmaking.modes needs at least one mode".into(),
            ));
        }
        if let Some(mode) =
            self.matchmaking.modes.iter().find(|mode| mode.party_size == 0)
        {
            return Err(ConfigError::Invalid(format!(
                "mode {} has a party_size of 0",
                mode.id
            )));
        }
        let max_expiration_secs = RoomConfig::MAX_EXPIRATION.as_secs();
        if self.rooms.expiration_secs > max_expiration_secs {
            return Err(ConfigError::Invalid(format!(
                "rooms.expiration_secs must be at most {max_expiration_secs}"
            )));
        }
        if self.rooms.expiration_secs <= self.rooms.connect_timeout_secs {
            return Err(ConfigError::Invalid(
                "rooms.expiration_secs must exceed rooms.connect_timeout_secs"
                    .into(),
            ));
        }
        if self.status.enabled && self.status.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "status.interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.server.handshake_timeout_ms)
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            connect_timeout: Duration::from_secs(self.rooms.connect_timeout_secs),
            expiration: Duration::from_secs(self.rooms.expiration_secs),
            ..RoomConfig::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(self.matchmaking.poll_interval_ms),
            modes: self
                .matchmaking
                .modes
                .iter()
                .map(|mode| ModeConfig::new(GameMode(mode.id), mode.party_size))
                .collect(),
        }
    }

    /// `None` when the status file is disabled.
    pub fn status_config(&self) -> Option<StatusConfig> {
        self.status.enabled.then(|| StatusConfig {
            path: self.status.path.clone(),
            interval: Duration::from_millis(self.status.interval_ms),
        })
    }
}
