use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base that stored image URLs are built from; `<endpoint>/<bucket>` unless overridden.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub timeout: Duration,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlashConfig {
    pub secret: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub image_store: ImageStoreConfig,
    pub upload: UploadConfig,
    pub flash: FlashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));
        let parsed_or = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let endpoint = required("IMAGE_STORE_ENDPOINT")?;
        let bucket = required("IMAGE_STORE_BUCKET")?;
        let public_url = lookup("IMAGE_STORE_PUBLIC_URL")
            .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));

        let image_store = ImageStoreConfig {
            access_key: required("IMAGE_STORE_ACCESS_KEY")?,
            secret_key: required("IMAGE_STORE_SECRET_KEY")?,
            region: lookup("IMAGE_STORE_REGION").unwrap_or_else(|| "us-east-1".into()),
            public_url: public_url.trim_end_matches('/').to_string(),
            endpoint,
            bucket,
        };

        let upload = UploadConfig {
            dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            timeout: Duration::from_secs(parsed_or("UPLOAD_TIMEOUT_SECS", 30)),
            max_bytes: parsed_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024) as usize,
        };

        let flash = FlashConfig {
            secret: required("SESSION_SECRET")?,
            ttl_secs: parsed_or("FLASH_TTL_SECS", 300),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: lookup("APP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(400),
            image_store,
            upload,
            flash,
        })
    }
}
