use std::time::Duration;

use serde::Deserialize;

use crate::utils::HubError;

/// Top-level configuration settings for the application.
///
/// Includes settings for the listener, both hubs and logging.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the WebSocket listener binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings shared by the workspace and user hubs.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HubSettings {
    /// Upper bound on live connections per hub; further upgrades get a 503.
    pub max_connections: usize,
    /// Messages buffered per connection before it counts as too slow.
    pub send_buffer: usize,
    /// Deadline for a single frame write to a peer.
    pub write_timeout_ms: u64,
    /// Ping period; 0 disables pings.
    pub heartbeat_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Settings as read from the sources, any field may be missing. Missing values are filled from defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHubSettings {
    pub max_connections: Option<usize>,
    pub send_buffer: Option<usize>,
    pub write_timeout_ms: Option<u64>,
    pub heartbeat_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            send_buffer: 64,
            write_timeout_ms: 5000,
            heartbeat_interval_secs: 0,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl HubSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_secs > 0).then(|| Duration::from_secs(self.heartbeat_interval_secs))
    }
}

impl Settings {
    /// Reject values the hubs cannot run with.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.hub.max_connections == 0 {
            return Err(HubError::InvalidSetting(
                "hub.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.hub.send_buffer == 0 {
            return Err(HubError::InvalidSetting(
                "hub.send_buffer must be greater than 0".to_string(),
            ));
        }
        if self.hub.write_timeout_ms == 0 {
            return Err(HubError::InvalidSetting(
                "hub.write_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let server = self.server;
        let hub = self.hub;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            hub: HubSettings {
                max_connections: hub
                    .as_ref()
                    .and_then(|h| h.max_connections)
                    .unwrap_or(default.hub.max_connections),
                send_buffer: hub
                    .as_ref()
                    .and_then(|h| h.send_buffer)
                    .unwrap_or(default.hub.send_buffer),
                write_timeout_ms: hub
                    .as_ref()
                    .and_then(|h| h.write_timeout_ms)
                    .unwrap_or(default.hub.write_timeout_ms),
                heartbeat_interval_secs: hub
                    .as_ref()
                    .and_then(|h| h.heartbeat_interval_secs)
                    .unwrap_or(default.hub.heartbeat_interval_secs),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}
