use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;

use crate::config::ImageStoreConfig;

/// Remote home of uploaded profile images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;

    /// Prefix every stored URL starts with, without a trailing slash.
    fn public_base(&self) -> &str;

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base(), key)
    }

    /// Recovers the object key from a URL minted by `public_url`; foreign URLs yield `None`.
    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.public_base())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3ImageStore {
    pub async fn new(cfg: &ImageStoreConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        tracing::info!(bucket = %cfg.bucket, endpoint = %cfg.endpoint, "image store initialized");

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_base: cfg.public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}
