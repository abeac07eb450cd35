//! Server configuration resolution
//!
//! Combines command-line/environment overrides (parsed by clap in the
//! binary) with the TOML file and compiled defaults into one
//! [`ServerConfig`].

use amrg_common::config::{CompiledDefaults, TomlConfig};
use amrg_common::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use tracing::{info, warn};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Values supplied on the command line or through environment variables
///
/// `None` means "not given", so the TOML file or compiled default applies.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub max_upload_mb: Option<u64>,
    pub log_level: Option<String>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Request body limit; `None` leaves uploads unbounded
    pub max_upload_bytes: Option<usize>,
    pub default_file_name: String,
    pub event_capacity: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], CompiledDefaults::PORT)),
            max_upload_bytes: None,
            default_file_name: CompiledDefaults::DEFAULT_FILE_NAME.to_string(),
            event_capacity: CompiledDefaults::EVENT_CAPACITY,
            log_level: CompiledDefaults::LOG_LEVEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Resolve every setting: overrides → TOML → compiled default
    ///
    /// # Errors
    /// [`Error::Config`] for an unparseable bind address or a zero event
    /// capacity.
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let bind_address = cli
            .bind_address
            .as_deref()
            .or(toml.bind_address.as_deref())
            .unwrap_or(CompiledDefaults::BIND_ADDRESS);
        let ip: IpAddr = bind_address
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind_address, e)))?;

        let port = cli.port.or(toml.port).unwrap_or(CompiledDefaults::PORT);

        let max_upload_bytes = cli
            .max_upload_mb
            .or(toml.max_upload_mb)
            .map(|mb| usize::try_from(mb.saturating_mul(BYTES_PER_MB)).unwrap_or(usize::MAX));

        let default_file_name = match toml.default_file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            Some(_) => {
                warn!("Ignoring blank default_file_name in config");
                CompiledDefaults::DEFAULT_FILE_NAME.to_string()
            }
            None => CompiledDefaults::DEFAULT_FILE_NAME.to_string(),
        };

        let event_capacity = toml.event_capacity.unwrap_or(CompiledDefaults::EVENT_CAPACITY);
        if event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }

        let log_level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| toml.logging.level.clone());

        let config = Self {
            bind_addr: SocketAddr::new(ip, port),
            max_upload_bytes,
            default_file_name,
            event_capacity,
            log_level,
        };

        info!(
            bind_addr = %config.bind_addr,
            max_upload_bytes = ?config.max_upload_bytes,
            "Configuration resolved"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amrg_common::config::LoggingConfig;

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ServerConfig::resolve(&CliOverrides::default(), &TomlConfig::default()).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr.port(), 5780);
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml = TomlConfig {
            bind_address: Some("0.0.0.0".to_string()),
            port: Some(6000),
            max_upload_mb: Some(10),
            logging: LoggingConfig {
                level: "warn".to_string(),
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            port: Some(7000),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        let config = ServerConfig::resolve(&cli, &toml).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:7000".parse().unwrap());
        assert_eq!(config.max_upload_bytes, Some(10 * 1024 * 1024));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_bind_address() {
        let cli = CliOverrides {
            bind_address: Some("not-an-ip".to_string()),
            ..Default::default()
        };
        let result = ServerConfig::resolve(&cli, &TomlConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_event_capacity_rejected() {
        let toml = TomlConfig {
            event_capacity: Some(0),
            ..Default::default()
        };
        let result = ServerConfig::resolve(&CliOverrides::default(), &toml);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_default_file_name_falls_back() {
        let toml = TomlConfig {
            default_file_name: Some("   ".to_string()),
            ..Default::default()
        };
        let config = ServerConfig::resolve(&CliOverrides::default(), &toml).unwrap();
        assert_eq!(config.default_file_name, "merged_audio.mp3");
    }
}
