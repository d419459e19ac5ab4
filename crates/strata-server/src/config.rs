// Configuration parsing from strata.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strata_client::ClientConfig;
use strata_loader::ResponseFormat;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub loading: LoadingConfig,

    /// Read by clients sharing this file
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

/// Loading pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// Answer format for requests without a data signal
    #[serde(default)]
    pub default_format: ResponseFormat,

    /// Header whose value authenticates a request; no auth when unset
    #[serde(default = "default_auth_header")]
    pub auth_header: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_auth_header() -> Option<String> {
    Some("authorization".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            default_format: ResponseFormat::default(),
            auth_header: default_auth_header(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A missing or empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from ./strata.toml, then apply env overrides
    pub fn load_default() -> Result<Self> {
        let mut config = Self::load("strata.toml")?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `STRATA_HOST`, `STRATA_PORT` and `STRATA_FORMAT`
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("STRATA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("STRATA_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid STRATA_PORT: {}", port))?;
        }
        if let Some(format) = var("STRATA_FORMAT") {
            self.loading.default_format = format
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid STRATA_FORMAT")?;
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
