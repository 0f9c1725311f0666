use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    /// How long an empty session is kept around to absorb reconnects.
    pub grace_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".into(),
            port: 3000,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(hostname) = lookup("HOSTNAME") {
            config.hostname = hostname;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "port number",
                value: port,
            })?;
        }
        if let Some(secs) = lookup("GEOSYNC_GRACE_PERIOD_SECS") {
            config.grace_period = secs
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    name: "GEOSYNC_GRACE_PERIOD_SECS",
                    expected: "number of seconds",
                    value: secs,
                })?;
        }
        Ok(config)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.hostname.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn it_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.grace_period, Duration::from_secs(30));
    }

    #[test]
    fn it_reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOSTNAME", "0.0.0.0"),
            ("PORT", "8080"),
            ("GEOSYNC_GRACE_PERIOD_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), ("0.0.0.0".to_string(), 8080));
        assert_eq!(config.grace_period, Duration::from_secs(5));
    }

    #[test]
    fn it_rejects_garbage() {
        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(
            ServerConfig::from_lookup(lookup(&[("GEOSYNC_GRACE_PERIOD_SECS", "-1")])).is_err()
        );
    }
}
