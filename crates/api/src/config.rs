//! Process configuration, read once from the environment.

use std::net::SocketAddr;

use stockledger_inventory::ShortfallPolicy;
use stockledger_observability::LogFormat;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid BIND_ADDR {0:?}")]
    InvalidBindAddr(String),
    #[error("USE_PERSISTENT_STORES is set but DATABASE_URL is missing")]
    MissingDatabaseUrl,
}

/// Where the stores live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub shortfall_policy: ShortfallPolicy,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr(bind.clone()))?;

        let persistent = lookup("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let store = if persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingDatabaseUrl)?;
            let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
                None => DEFAULT_MAX_CONNECTIONS,
                Some(raw) => match raw.trim().parse::<u32>() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        warn!(value = %raw, "invalid DATABASE_MAX_CONNECTIONS; using default");
                        DEFAULT_MAX_CONNECTIONS
                    }
                },
            };
            StoreBackend::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StoreBackend::InMemory
        };

        let shortfall_policy = match lookup("SHORTFALL_POLICY") {
            None => ShortfallPolicy::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unknown SHORTFALL_POLICY; using warn");
                ShortfallPolicy::default()
            }),
        };

        let log_format = lookup("LOG_FORMAT")
            .map(|v| LogFormat::parse_lossy(&v))
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            store,
            shortfall_policy,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_in_memory_on_port_8080() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(cfg.store, StoreBackend::InMemory);
        assert_eq!(cfg.shortfall_policy, ShortfallPolicy::Warn);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        let err = config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingDatabaseUrl);
    }

    #[test]
    fn persistent_stores_read_pool_settings() {
        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "1"),
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(
            cfg.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/stock".into(),
                max_connections: 12,
            }
        );
    }

    #[test]
    fn bad_pool_size_falls_back_to_default() {
        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "yes"),
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("DATABASE_MAX_CONNECTIONS", "zero"),
        ])
        .unwrap();
        assert!(matches!(
            cfg.store,
            StoreBackend::Postgres { max_connections: DEFAULT_MAX_CONNECTIONS, .. }
        ));
    }

    #[test]
    fn shortfall_policy_and_log_format_are_configurable() {
        let cfg = config(&[("SHORTFALL_POLICY", "Reject"), ("LOG_FORMAT", "text")]).unwrap();
        assert_eq!(cfg.shortfall_policy, ShortfallPolicy::Reject);
        assert_eq!(cfg.log_format, LogFormat::Text);

        let cfg = config(&[("SHORTFALL_POLICY", "maybe")]).unwrap();
        assert_eq!(cfg.shortfall_policy, ShortfallPolicy::Warn);
    }

    #[test]
    fn rejects_unparseable_bind_addr() {
        let err = config(&[("BIND_ADDR", "localhost")]).unwrap_err();
        assert_eq!(err, ConfigError::InvalidBindAddr("localhost".into()));
    }
}
