// src/settings.rs
//! Runtime configuration.
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file by the binaries) through the `config` crate.
//!
//! ## Environment Variables
//! - `PORT`: listen port (default: 3000)
//! - `BIND_HOST`: listen address (default: 127.0.0.1)
//! - `BADGE_HMAC_SECRET`: signing secret; unset or empty issues unsigned badges
//! - `REGISTRY_DIR`: registry directory (default: `registry`)
//! - `SITE_BASE`: prefix for badge verify links (default: empty)
//! - `ISSUER_NAME` / `ISSUER_WEBSITE`: issuer metadata for a new registry

use crate::models::badge::Issuer;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("BADGE_HMAC_SECRET is too short ({len} bytes); use at least {min}")]
    WeakSecret { len: usize, min: usize },

    #[error("invalid BIND_HOST {0:?}")]
    InvalidBindHost(String),
}

/// Validated application settings shared by the server and the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub bind_host: String,
    #[serde(default)]
    badge_hmac_secret: Option<String>,
    pub registry_dir: PathBuf,
    site_base: String,
    pub issuer_name: String,
    pub issuer_website: String,
}

impl AppConfig {
    /// Loads settings from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(Environment::default()))
    }

    /// Loads settings from an arbitrary builder, filling in defaults.
    ///
    /// # Errors
    /// - `Source` if a value has the wrong type (e.g. a non-numeric port)
    /// - `WeakSecret` if a secret is set but shorter than [`MIN_SECRET_LEN`]
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let mut settings: AppConfig = builder
            .set_default("port", 3000_i64)?
            .set_default("bind_host", "127.0.0.1")?
            .set_default("registry_dir", "registry")?
            .set_default("site_base", "")?
            .set_default("issuer_name", "BugBox")?
            .set_default("issuer_website", "")?
            .build()?
            .try_deserialize()?;

        settings.badge_hmac_secret = settings.badge_hmac_secret.filter(|s| !s.is_empty());
        if let Some(secret) = &settings.badge_hmac_secret {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::WeakSecret {
                    len: secret.len(),
                    min: MIN_SECRET_LEN,
                });
            }
        }
        settings.site_base = settings.site_base.trim_end_matches('/').to_string();

        Ok(settings)
    }

    /// Signing secret, `None` in unsigned mode.
    pub fn signing_secret(&self) -> Option<&str> {
        self.badge_hmac_secret.as_deref()
    }

    /// Verify-link prefix without a trailing slash.
    pub fn site_base(&self) -> &str {
        &self.site_base
    }

    /// Issuer metadata for a registry that does not exist yet.
    pub fn default_issuer(&self) -> Issuer {
        Issuer::new(self.issuer_name.clone(), self.issuer_website.clone())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_host
            .parse()
            .map_err(|_| ConfigError::InvalidBindHost(self.bind_host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
