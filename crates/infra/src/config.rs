//! Runtime configuration from environment variables.
//!
//! Every variable has a default except `DATABASE_URL`, which is only required
//! when the persistent backend is selected. Parsing goes through a lookup
//! function so tests never mutate the process environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use medstock_inventory::BranchKey;

use crate::registry::BranchRegistry;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TX_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Which ledger backend to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    InMemory,
    Postgres(DatabaseConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub backend: BackendKind,
    pub branches: Vec<BranchKey>,
    /// Upper bound on one movement's unit of work, lock waits included.
    pub tx_timeout: Duration,
    pub bind_addr: SocketAddr,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::InMemory,
            branches: BranchKey::ALL.to_vec(),
            tx_timeout: Duration::from_millis(DEFAULT_TX_TIMEOUT_MS),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let use_persistent = match var("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "USE_PERSISTENT_STORES is not a bool; using in-memory stores");
                false
            }),
        };

        let backend = if use_persistent {
            let url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = parse_or("DB_MAX_CONNECTIONS", var("DB_MAX_CONNECTIONS"), DEFAULT_MAX_CONNECTIONS)?;
            if max_connections == 0 {
                return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", "must be at least 1"));
            }
            let acquire_ms = parse_or("DB_ACQUIRE_TIMEOUT_MS", var("DB_ACQUIRE_TIMEOUT_MS"), DEFAULT_ACQUIRE_TIMEOUT_MS)?;
            BackendKind::Postgres(DatabaseConfig {
                url,
                max_connections,
                acquire_timeout: Duration::from_millis(acquire_ms),
            })
        } else {
            BackendKind::InMemory
        };

        let branches = match var("LEDGER_BRANCHES") {
            None => BranchKey::ALL.to_vec(),
            Some(raw) => parse_branches(&raw)?,
        };

        let tx_timeout_ms = parse_or("LEDGER_TX_TIMEOUT_MS", var("LEDGER_TX_TIMEOUT_MS"), DEFAULT_TX_TIMEOUT_MS)?;
        if tx_timeout_ms == 0 {
            return Err(ConfigError::invalid("LEDGER_TX_TIMEOUT_MS", "must be positive"));
        }

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e.to_string()))?;

        Ok(Self {
            backend,
            branches,
            tx_timeout: Duration::from_millis(tx_timeout_ms),
            bind_addr,
        })
    }

    pub fn registry(&self) -> BranchRegistry {
        BranchRegistry::new(self.branches.iter().copied())
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, BackendKind::Postgres(_))
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(name, format!("{raw:?}: {e}"))),
    }
}

fn parse_branches(raw: &str) -> Result<Vec<BranchKey>, ConfigError> {
    let keys = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<BranchKey>()
                .map_err(|e| ConfigError::invalid("LEDGER_BRANCHES", e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if keys.is_empty() {
        return Err(ConfigError::invalid("LEDGER_BRANCHES", "no branches listed"));
    }
    Ok(keys)
}
