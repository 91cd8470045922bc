//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default seconds between race ticks
pub const DEFAULT_TURN_INTERVAL_SECS: u64 = 7;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,

    /// Delay between ticks of a running race
    pub turn_interval: Duration,
    /// Where race wins are persisted
    pub wins_file: PathBuf,

    /// Directory service for units and participant names
    pub directory_url: Option<String>,
    pub directory_api_key: Option<String>,
    /// Static unit list used when no directory is configured
    pub units_file: Option<PathBuf>,

    /// HS256 secret for bearer tokens
    pub token_secret: String,
    /// Allowed client origins for CORS
    pub client_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // PORT wins over SERVER_ADDR, as on most hosting platforms
        let server_addr = match var("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => var("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let turn_interval_secs = match var("TURN_INTERVAL_SECS") {
            None => DEFAULT_TURN_INTERVAL_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs >= 1 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "TURN_INTERVAL_SECS",
                        value: raw,
                    })
                }
            },
        };

        let client_origins = var("CLIENT_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,

            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,

            turn_interval: Duration::from_secs(turn_interval_secs),
            wins_file: var("WINS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("race_wins.json")),

            directory_url: var("DIRECTORY_URL"),
            directory_api_key: var("DIRECTORY_API_KEY"),
            units_file: var("UNITS_FILE").map(PathBuf::from),

            token_secret: var("TOKEN_SECRET").ok_or(ConfigError::Missing("TOKEN_SECRET"))?,
            client_origins,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_secret() {
        let config = load(&[("TOKEN_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.turn_interval, Duration::from_secs(7));
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.wins_file, PathBuf::from("race_wins.json"));
        assert_eq!(config.client_origins, ["http://localhost:3000"]);
        assert!(config.directory_url.is_none());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = load(&[
            ("TOKEN_SECRET", "x"),
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:1"),
        ])
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("TOKEN_SECRET"))));
        assert!(matches!(
            load(&[("TOKEN_SECRET", "x"), ("TURN_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { key: "TURN_INTERVAL_SECS", .. })
        ));
        assert!(matches!(
            load(&[("TOKEN_SECRET", "x"), ("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { key: "LOG_FORMAT", .. })
        ));
        assert!(matches!(
            load(&[("TOKEN_SECRET", "x"), ("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn splits_client_origins() {
        let config = load(&[
            ("TOKEN_SECRET", "x"),
            ("CLIENT_ORIGIN", "https://a.example, https://b.example"),
        ])
        .unwrap();
        assert_eq!(config.client_origins, ["https://a.example", "https://b.example"]);
    }
}
