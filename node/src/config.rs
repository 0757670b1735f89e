// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use ledger_kernel::config::{DEFAULT_MAX_PAYLOAD_BYTES, MAX_EVENT_ID_LEN};
use ledger_kernel::Limits;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Which ConsensusStore adapter the node talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store. Single node, not durable; for development and tests.
    Memory,
    /// etcd v3 JSON gateway, endpoints tried in order.
    Etcd { endpoints: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    /// Budget for a whole Seal call, from intake to commit acknowledgement.
    pub commit_deadline: Duration,
    /// Bound on read-and-swap rounds against the sequence counter.
    pub max_allocator_attempts: u32,
    pub idempotency_retention: Duration,
    pub idempotency_sweep_interval: Duration,
    pub max_payload_bytes: usize,
    /// Upper bound handed to the store adapter for any single call.
    pub store_op_timeout: Duration,
    pub health_probe_timeout: Duration,
    pub key_prefix: String,
    pub store: StoreBackend,
    pub auth_token: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            commit_deadline: Duration::from_millis(50),
            max_allocator_attempts: 8,
            idempotency_retention: Duration::from_secs(600),
            idempotency_sweep_interval: Duration::from_secs(30),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            store_op_timeout: Duration::from_millis(30),
            health_probe_timeout: Duration::from_millis(250),
            key_prefix: "ledger".to_string(),
            store: StoreBackend::Memory,
            auth_token: None,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `LEDGER_*` environment variables.
    ///
    /// Setting `ETCD_ENDPOINTS` (comma separated) selects the etcd adapter.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(addr) = env_parse::<SocketAddr>("LEDGER_BIND_ADDR")? {
            cfg.bind_addr = addr;
        }
        if let Some(ms) = env_parse::<u64>("LEDGER_COMMIT_DEADLINE_MS")? {
            cfg.commit_deadline = Duration::from_millis(ms);
        }
        if let Some(n) = env_parse::<u32>("LEDGER_MAX_ALLOCATOR_ATTEMPTS")? {
            cfg.max_allocator_attempts = n;
        }
        if let Some(secs) = env_parse::<u64>("LEDGER_IDEMPOTENCY_RETENTION_SECS")? {
            cfg.idempotency_retention = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("LEDGER_IDEMPOTENCY_SWEEP_SECS")? {
            cfg.idempotency_sweep_interval = Duration::from_secs(secs);
        }
        if let Some(n) = env_parse::<usize>("LEDGER_MAX_PAYLOAD_BYTES")? {
            cfg.max_payload_bytes = n;
        }
        if let Some(ms) = env_parse::<u64>("LEDGER_STORE_TIMEOUT_MS")? {
            cfg.store_op_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("LEDGER_HEALTH_PROBE_TIMEOUT_MS")? {
            cfg.health_probe_timeout = Duration::from_millis(ms);
        }
        if let Ok(prefix) = std::env::var("LEDGER_KEY_PREFIX") {
            cfg.key_prefix = prefix;
        }
        if let Ok(token) = std::env::var("LEDGER_AUTH_TOKEN") {
            if !token.is_empty() {
                cfg.auth_token = Some(token);
            }
        }
        if let Ok(raw) = std::env::var("ETCD_ENDPOINTS") {
            let endpoints: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !endpoints.is_empty() {
                cfg.store = StoreBackend::Etcd { endpoints };
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_deadline.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LEDGER_COMMIT_DEADLINE_MS",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_allocator_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "LEDGER_MAX_ALLOCATOR_ATTEMPTS",
                reason: "at least one attempt is required".into(),
            });
        }
        if self.store_op_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LEDGER_STORE_TIMEOUT_MS",
                reason: "must be greater than zero".into(),
            });
        }
        if self.idempotency_sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LEDGER_IDEMPOTENCY_SWEEP_SECS",
                reason: "must be greater than zero".into(),
            });
        }
        if self.health_probe_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LEDGER_HEALTH_PROBE_TIMEOUT_MS",
                reason: "must be greater than zero".into(),
            });
        }
        if self.key_prefix.is_empty() || self.key_prefix.ends_with('/') {
            return Err(ConfigError::Invalid {
                var: "LEDGER_KEY_PREFIX",
                reason: "must be non-empty without a trailing '/'".into(),
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_payload_bytes: self.max_payload_bytes,
            max_event_id_bytes: MAX_EVENT_ID_LEN,
        }
    }
}

fn env_parse<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_latency_contract() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.commit_deadline, Duration::from_millis(50));
        assert!(cfg.store_op_timeout < cfg.commit_deadline);
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut cfg = NodeConfig::default();
        cfg.max_allocator_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = NodeConfig::default();
        cfg.key_prefix = "ledger/".into();
        assert!(cfg.validate().is_err());

        let mut cfg = NodeConfig::default();
        cfg.commit_deadline = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = NodeConfig::default();
        cfg.idempotency_sweep_interval = Duration::ZERO;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { var: "LEDGER_IDEMPOTENCY_SWEEP_SECS", .. })
        ));

        let mut cfg = NodeConfig::default();
        cfg.health_probe_timeout = Duration::ZERO;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { var: "LEDGER_HEALTH_PROBE_TIMEOUT_MS", .. })
        ));
    }

    #[test]
    fn test_limits_follow_payload_setting() {
        let mut cfg = NodeConfig::default();
        cfg.max_payload_bytes = 42;
        assert_eq!(cfg.limits().max_payload_bytes, 42);
    }
}
