use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("host '{host}' has an empty address")]
    EmptyAddress { host: String },

    #[error("host '{host}' uses port 0")]
    InvalidPort { host: String },

    #[error("script '{command}' on host '{host}' has poll_interval 0, it must be at least 1 second")]
    InvalidPollInterval { host: String, command: String },

    #[error("target id '{0}' is used more than once")]
    DuplicateTargetId(String),

    #[error("allowed client '{0}' is not an IP address")]
    InvalidAllowedClient(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Client IPs allowed to use the control API (empty: no restriction)
    #[serde(default)]
    pub allowed_clients: Vec<String>,
    /// Optional directory holding a web frontend
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// A remote machine running the process supervisor
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HostConfig {
    /// Section label shown in the panel
    pub name: String,
    pub address: String,
    /// Supervisor port, shared by every script on the host (default: 5005)
    #[serde(default = "default_supervisor_port")]
    pub port: u16,
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScriptConfig {
    /// Stable target id; a random one is generated when omitted
    #[serde(default)]
    pub id: String,
    /// Initial command line sent as the payload
    pub command: String,
    /// Seconds between status polls (default: 5)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_supervisor_port() -> u16 {
    5005
}

fn default_poll_interval() -> u64 {
    5
}

impl AppConfig {
    /// Load from a TOML file, with `SCRIPTDECK__SECTION__KEY` environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(::config::Environment::with_prefix("SCRIPTDECK").separator("__"))
            .build()?;

        let app_config: AppConfig = settings.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for client in &self.server.allowed_clients {
            if client.parse::<IpAddr>().is_err() {
                return Err(ConfigError::InvalidAllowedClient(client.clone()));
            }
        }

        let mut seen_ids = HashSet::new();
        for host in &self.hosts {
            if host.address.trim().is_empty() {
                return Err(ConfigError::EmptyAddress {
                    host: host.name.clone(),
                });
            }
            if host.port == 0 {
                return Err(ConfigError::InvalidPort {
                    host: host.name.clone(),
                });
            }
            for script in &host.scripts {
                if script.poll_interval == 0 {
                    return Err(ConfigError::InvalidPollInterval {
                        host: host.name.clone(),
                        command: script.command.clone(),
                    });
                }
                if !script.id.is_empty() && !seen_ids.insert(script.id.as_str()) {
                    return Err(ConfigError::DuplicateTargetId(script.id.clone()));
                }
            }
        }

        Ok(())
    }

    pub fn target_count(&self) -> usize {
        self.hosts.iter().map(|h| h.scripts.len()).sum()
    }
}

#[cfg(test)]
pub(crate) fn parse_toml(text: &str) -> Result<AppConfig, ConfigError> {
    let settings = ::config::Config::builder()
        .add_source(::config::File::from_str(text, ::config::FileFormat::Toml))
        .build()?;
    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "127.0.0.1"
port = 8080

[[hosts]]
name = "Pi 1"
address = "192.168.0.211"

[[hosts.scripts]]
id = "cam-left"
command = "python /home/pi/camStreamer.py --ip 192.168.0.225 --port 5000"

[[hosts.scripts]]
command = "python /home/pi/motor.py --port 5002"
poll_interval = 2

[[hosts]]
name = "Pi 2"
address = "192.168.0.19"
port = 6000
"#;

    #[test]
    fn test_defaults_are_applied() {
        let config = parse_toml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.logging.level, "info");
        assert!(config.server.allowed_clients.is_empty());
        assert_eq!(config.hosts[0].port, 5005);
        assert_eq!(config.hosts[0].scripts[0].poll_interval, 5);
        assert_eq!(config.hosts[0].scripts[1].poll_interval, 2);
        assert!(config.hosts[0].scripts[1].id.is_empty());
        assert_eq!(config.hosts[1].port, 6000);
        assert!(config.hosts[1].scripts.is_empty());
        assert_eq!(config.target_count(), 2);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let mut config = parse_toml(SAMPLE).unwrap();
        config.hosts[0].scripts[0].poll_interval = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPollInterval { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut config = parse_toml(SAMPLE).unwrap();
        config.hosts[0].scripts[1].id = "cam-left".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateTargetId(id)) if id == "cam-left"
        ));
    }

    #[test]
    fn test_bad_allowed_client_is_rejected() {
        let mut config = parse_toml(SAMPLE).unwrap();
        config.server.allowed_clients = vec!["10.0.0.1".to_string(), "my-laptop".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAllowedClient(c)) if c == "my-laptop"
        ));
    }

    #[test]
    fn test_empty_address_is_rejected() {
        let mut config = parse_toml(SAMPLE).unwrap();
        config.hosts[1].address = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyAddress { .. })));
    }
}
