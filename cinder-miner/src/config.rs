//! Environment-driven configuration.
//!
//! Everything the daemon needs is read from `CINDER_*` environment
//! variables. Invalid values log a warning and fall back to their default;
//! startup never aborts on a bad knob, only on an empty pool list (which the
//! manager itself refuses).

use std::str::FromStr;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::manager::ManagerConfig;
use crate::tracing::prelude::*;
use crate::types::MinerType;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Failover-ordered pool endpoints (`CINDER_POOLS`, comma separated)
    pub pools: Vec<Endpoint>,

    /// Backend selection (`CINDER_MINER_TYPE`: cl | cuda | mixed)
    pub miner_type: MinerType,

    /// Connect attempts per endpoint before rotating
    /// (`CINDER_MAX_ATTEMPTS`)
    pub max_attempts: u32,

    /// Minutes on a fallback before returning to the primary; 0 disables
    /// (`CINDER_FAILOVER_TIMEOUT`)
    pub failover_timeout_minutes: u64,

    /// Seconds between hashrate submissions (`CINDER_HASHRATE_INTERVAL`)
    pub hashrate_interval_secs: u64,

    /// HTTP API listen address (`CINDER_API_LISTEN`)
    pub api_listen: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pools: Vec::new(),
            miner_type: MinerType::Cl,
            max_attempts: 3,
            failover_timeout_minutes: 0,
            hashrate_interval_secs: 60,
            api_listen: "127.0.0.1:3580".to_string(),
        }
    }
}

impl Config {
    /// Load from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pools: std::env::var("CINDER_POOLS")
                .map(|raw| parse_pools(&raw))
                .unwrap_or_default(),
            miner_type: env_or("CINDER_MINER_TYPE", defaults.miner_type),
            max_attempts: env_or("CINDER_MAX_ATTEMPTS", defaults.max_attempts),
            failover_timeout_minutes: env_or(
                "CINDER_FAILOVER_TIMEOUT",
                defaults.failover_timeout_minutes,
            ),
            hashrate_interval_secs: env_or(
                "CINDER_HASHRATE_INTERVAL",
                defaults.hashrate_interval_secs,
            ),
            api_listen: std::env::var("CINDER_API_LISTEN").unwrap_or(defaults.api_listen),
        }
    }

    /// The manager tuning this configuration describes.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            miner_type: self.miner_type,
            max_attempts: self.max_attempts,
            failover_timeout: match self.failover_timeout_minutes {
                0 => None,
                minutes => Some(Duration::from_secs(minutes * 60)),
            },
            hashrate_interval: Duration::from_secs(self.hashrate_interval_secs.max(1)),
        }
    }
}

/// Parse a comma-separated endpoint list, dropping entries that do not
/// parse.
fn parse_pools(raw: &str) -> Vec<Endpoint> {
    raw.split(',')
        .map(str::trim)
        .filter(|uri| !uri.is_empty())
        .filter_map(|uri| match uri.parse::<Endpoint>() {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!(uri, error = %e, "Skipping unparseable pool URI");
                None
            }
        })
        .collect()
}

/// Read and parse one variable, falling back to `default` when unset or
/// unparseable.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match std::env::var(name) {
        Ok(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    name,
                    value,
                    default = format!("{:?}", default),
                    "Invalid value, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}
