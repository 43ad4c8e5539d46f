use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::staging::StagedFile;
use crate::error::AppError;
use crate::storage::ImageStore;

/// Sends a staged file to the image store and returns its public URL.
///
/// The staged file is consumed, so the local copy is gone when this returns,
/// on success and failure alike.
#[instrument(skip(images, staged), fields(file = %staged.file_name(), bytes = staged.size_bytes()))]
pub async fn forward(
    images: &dyn ImageStore,
    staged: StagedFile,
    timeout: Duration,
) -> Result<String, AppError> {
    let body = tokio::fs::read(staged.path())
        .await
        .with_context(|| format!("read staged file {}", staged.path().display()))?;
    let key = object_key(staged.content_type(), staged.file_name());

    let put = images.put_object(&key, Bytes::from(body), staged.content_type());
    match tokio::time::timeout(timeout, put).await {
        Ok(Ok(())) => {
            info!(%key, "image uploaded");
            Ok(images.public_url(&key))
        }
        Ok(Err(e)) => {
            let detail = format!("{e:#}");
            warn!(error = %detail, %key, "image upload failed");
            Err(AppError::Upload(detail))
        }
        Err(_) => {
            warn!(%key, timeout_secs = timeout.as_secs_f64(), "image upload timed out");
            Err(AppError::Upload(format!("timed out after {timeout:?}")))
        }
    }
}

/// Best-effort removal of a remote image by its URL. Failures are logged only.
#[instrument(skip(images))]
pub async fn discard(images: &dyn ImageStore, url: &str) {
    let Some(key) = images.key_for_url(url) else {
        warn!("image url is not managed by this store; leaving it");
        return;
    };
    match images.delete_object(&key).await {
        Ok(()) => info!(%key, "image deleted"),
        Err(e) => warn!(error = ?e, %key, "image delete failed"),
    }
}

pub fn object_key(content_type: &str, file_name: &str) -> String {
    let ext = ext_from_mime(content_type)
        .map(str::to_string)
        .or_else(|| ext_from_name(file_name))
        .unwrap_or_else(|| "bin".into());
    format!("users/{}.{}", Uuid::new_v4(), ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn ext_from_name(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ok = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    ok.then(|| ext.to_ascii_lowercase())
}
