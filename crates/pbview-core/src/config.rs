//! Configuration types for pbview

use crate::error::{PbViewError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default period between failure detector advances
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of missed ticks before a server is presumed dead
pub const DEFAULT_DEAD_PINGS: u32 = 5;

/// Configuration of a view service instance
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewServiceConfig {
    /// Address the HTTP endpoint binds to
    pub listen_addr: SocketAddr,

    /// Period between failure detector advances
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,

    /// Missed ticks after which a role holder or idle server is presumed dead
    pub dead_pings: u32,
}

impl Default for ViewServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 7070)),
            tick_interval: DEFAULT_TICK_INTERVAL,
            dead_pings: DEFAULT_DEAD_PINGS,
        }
    }
}

impl ViewServiceConfig {
    /// Load a JSON config file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), ?config, "loaded view service config");
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(PbViewError::InvalidConfig(
                "tick_interval must be positive".to_string(),
            ));
        }
        if self.dead_pings == 0 {
            return Err(PbViewError::InvalidConfig(
                "dead_pings must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// How long a silent server survives before it is presumed dead
    pub fn dead_after(&self) -> Duration {
        self.tick_interval * self.dead_pings
    }
}

/// Client-side configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// View service address
    pub server_addr: SocketAddr,

    /// Per-request timeout
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 7070)),
            request_timeout: Duration::from_secs(1),
        }
    }
}

// Serde helper for Duration
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
