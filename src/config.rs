//! Layered configuration: built-in defaults, then a YAML file, then
//! `ZENITH_`-prefixed environment variables (`__` separates nested keys).
//!
//! ```yaml
//! storage:
//!   kind: remote
//!   api_url: http://localhost:3000
//!   timeout_secs: 10
//! session_file: .zenith/session.json
//! upcoming_window_days: 7
//! ```

use crate::domain::user::UserId;
use crate::error::Result;
use crate::infrastructure::http::DEFAULT_API_URL;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "zenith.yaml";

/// Where debts, payments and incomes live.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Nothing survives the process.
    Memory,
    /// A JSON document on disk.
    File { path: PathBuf },
    /// A RocksDB directory (requires the `storage-rocksdb` feature).
    RocksDb { path: PathBuf },
    /// The REST backend, acting for the logged-in session.
    Remote {
        #[serde(default = "default_api_url")]
        api_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub storage: StorageConfig,
    pub session_file: PathBuf,
    /// Owner of the records kept by local storage, which has no login.
    pub local_user_id: UserId,
    /// How far ahead the dashboard looks for due dates.
    pub upcoming_window_days: u32,
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::File {
                path: PathBuf::from(".zenith/data.json"),
            },
            session_file: PathBuf::from(".zenith/session.json"),
            local_user_id: 1,
            upcoming_window_days: 7,
            log: "warn".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration, reading `file` or `zenith.yaml` when present.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::figment(file).extract().map_err(Box::new).map_err(Into::into)
    }

    pub fn figment(file: Option<&Path>) -> Figment {
        let file = file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed("ZENITH_").split("__"))
    }
}
