use std::env;
use std::path::PathBuf;

use pairing_core::{FeasibilityPolicy, DEFAULT_RETRY_BUDGET};
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Json(PathBuf),
    Sqlite(PathBuf),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub retry_budget: usize,
    pub feasibility: FeasibilityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            feasibility: FeasibilityPolicy::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub admin_password: String,
    pub store: StoreBackend,
    pub roster_path: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let store = if let Some(path) = lookup("PAIRING_DB_PATH") {
            StoreBackend::Sqlite(path.into())
        } else if let Some(path) = lookup("PERSIST_PATH") {
            StoreBackend::Json(path.into())
        } else {
            StoreBackend::Memory
        };

        let defaults = EngineConfig::default();
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            admin_password: lookup("ADMIN_PASSWORD").unwrap_or_else(|| "changeme".to_string()),
            store,
            roster_path: lookup("ROSTER_PATH").map(PathBuf::from),
            engine: EngineConfig {
                retry_budget: parse_or(&lookup, "PAIRING_RETRY_BUDGET", defaults.retry_budget),
                feasibility: FeasibilityPolicy {
                    max_bucket_share_percent: parse_or(
                        &lookup,
                        "MAX_BUCKET_SHARE_PERCENT",
                        defaults.feasibility.max_bucket_share_percent,
                    ),
                },
            },
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}
