//! Layered settings: built-in defaults, an optional TOML file, then
//! `FLEETTRACK__*` environment variables (highest priority).

use std::{net::SocketAddr, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{Error, Result};

const ENV_PREFIX: &str = "FLEETTRACK";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub flush: FlushConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Directory of the sled database holding vehicle locations
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Frames queued per observer before it counts as too slow
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Upper bound on one socket write (unit: milliseconds)
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            outbound_queue: default_outbound_queue(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FlushConfig {
    /// Period between two flush cycles (unit: milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upserts running at once within one cycle
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound on one upsert (unit: milliseconds)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default = "default_flush_on_shutdown")]
    pub flush_on_shutdown: bool,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            concurrency: default_concurrency(),
            store_timeout_ms: default_store_timeout_ms(),
            flush_on_shutdown: default_flush_on_shutdown(),
        }
    }
}

impl FlushConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}
fn default_db_path() -> String {
    "fleettrack.db".to_owned()
}
fn default_outbound_queue() -> usize {
    64
}
fn default_send_timeout_ms() -> u64 {
    5_000
}
fn default_interval_ms() -> u64 {
    60_000
}
fn default_concurrency() -> usize {
    8
}
fn default_store_timeout_ms() -> u64 {
    5_000
}
fn default_flush_on_shutdown() -> bool {
    true
}

impl Settings {
    /// Merge the optional file at `path` and the environment over the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush.interval_ms == 0 {
            return Err(Error::InvalidConfig("flush.interval_ms must be > 0".into()));
        }
        if self.flush.concurrency == 0 {
            return Err(Error::InvalidConfig("flush.concurrency must be > 0".into()));
        }
        if self.server.outbound_queue == 0 {
            return Err(Error::InvalidConfig(
                "server.outbound_queue must be > 0".into(),
            ));
        }
        Ok(())
    }
}
