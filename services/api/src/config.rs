//! HTTP server settings
//!
//! Loaded with the `config` crate from built-in defaults overridden by
//! `FOODGRAM_*` environment variables (e.g. `FOODGRAM_BIND_ADDRESS`).

use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the listener binds to
    pub bind_address: String,
    /// Externally visible origin, used for media URLs, page links and short links
    pub public_url: String,
    /// Directory uploaded images are written to
    pub media_root: PathBuf,
    /// Default page size for paginated lists
    pub page_size: u32,
    /// Largest accepted request body, base64 images included
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load settings from defaults and the environment
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("bind_address", "0.0.0.0:8000")?
            .set_default("public_url", "http://localhost:8000")?
            .set_default("media_root", "media")?
            .set_default("page_size", 6_i64)?
            .set_default("max_upload_bytes", 10_i64 * 1024 * 1024)?
            .add_source(Environment::with_prefix("FOODGRAM").try_parsing(true))
            .build()?;

        let mut config: ServerConfig = settings.try_deserialize()?;
        config.public_url = config.public_url.trim_end_matches('/').to_string();
        if config.page_size == 0 {
            anyhow::bail!("FOODGRAM_PAGE_SIZE must be positive");
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            public_url: "http://localhost:8000".to_string(),
            media_root: PathBuf::from("media"),
            page_size: 6,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}
