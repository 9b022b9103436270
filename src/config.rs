//! Service configuration.
//!
//! Settings are resolved from built-in defaults, an optional TOML file and a
//! `WSRELAY_*` environment overlay (`__` separates nesting levels, e.g.
//! `WSRELAY_BUS__URL`), read once at startup.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub bus: BusConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    pub backend: BusBackend,
    pub url: String,
}

/// Which bus implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    Redis,
    /// In-process bus, for local development without a Redis instance.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Endpoint the bearer credential is forwarded to for validation.
    pub check_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to reach the API. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 23000_i64)?
            .set_default("bus.backend", "redis")?
            .set_default("bus.url", "redis://127.0.0.1:6379")?
            .set_default("auth.check_url", "http://127.0.0.1:8080/api/auth/check")?
            .set_default("cors.allowed_origins", Vec::<String>::new())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix("WSRELAY").separator("__"))
            .build()
            .context("loading configuration")?;

        settings.try_deserialize().context("parsing configuration")
    }
}
