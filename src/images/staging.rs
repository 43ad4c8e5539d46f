use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::extract::multipart::Field;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::AppError;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

const MAX_NAME_ATTEMPTS: i128 = 8;

/// `<field>_<nanos>_<original>` with both free-form parts reduced to a safe charset.
pub fn staging_name(field: &str, nanos: i128, original: &str) -> String {
    let base = original.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(original);
    format!(
        "{}_{}_{}",
        UNSAFE_CHARS.replace_all(field, "_"),
        nanos,
        UNSAFE_CHARS.replace_all(base, "_")
    )
}

/// An uploaded file written to the local upload directory.
///
/// The file is removed when the value is dropped, whatever happened to the upload.
/// Removal failures are logged and never surface to the request.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    file_name: String,
    content_type: String,
    len: u64,
}

impl StagedFile {
    /// Streams a multipart file part to disk.
    ///
    /// Returns `Ok(None)` for a part that carries no file: browsers submit an
    /// empty part with an empty filename when nothing was chosen.
    pub async fn stage(dir: &Path, mut field: Field<'_>) -> Result<Option<Self>, AppError> {
        let field_name = field.name().unwrap_or("file").to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());

        if file_name.is_empty() {
            drain(&mut field).await?;
            return Ok(None);
        }

        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create upload dir {}", dir.display()))?;

        let (path, mut file) = create_unique(dir, &field_name, &file_name).await?;
        let mut staged = StagedFile {
            path,
            file_name,
            content_type,
            len: 0,
        };

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Upload(format!("read multipart body: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("write {}", staged.path.display()))?;
            staged.len += chunk.len() as u64;
        }
        file.flush()
            .await
            .with_context(|| format!("flush {}", staged.path.display()))?;

        if staged.len == 0 {
            return Ok(None);
        }

        debug!(path = %staged.path.display(), bytes = staged.len, "file staged");
        Ok(Some(staged))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.len
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // Drop cannot await; a single unlink is short enough to run inline.
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "staging file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %self.path.display(), "failed to remove staging file"),
        }
    }
}

async fn create_unique(
    dir: &Path,
    field_name: &str,
    file_name: &str,
) -> Result<(PathBuf, fs::File), AppError> {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(staging_name(field_name, nanos + attempt, file_name));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("create {}", path.display()))
                    .into())
            }
        }
    }
    Err(anyhow::anyhow!("no free staging name for {file_name}").into())
}

/// Consumes a part that is not going to be kept.
pub async fn drain(field: &mut Field<'_>) -> Result<(), AppError> {
    while field
        .chunk()
        .await
        .map_err(|e| AppError::Upload(format!("read multipart body: {e}")))?
        .is_some()
    {}
    Ok(())
}

#[cfg(test)]
mod staging_tests {
    use super::*;

    #[test]
    fn staging_name_keeps_safe_characters() {
        assert_eq!(staging_name("image", 42, "me.png"), "image_42_me.png");
        assert_eq!(
            staging_name("image", 7, "holiday photo (1).jpeg"),
            "image_7_holiday_photo__1_.jpeg"
        );
    }

    #[test]
    fn staging_name_cannot_escape_the_upload_dir() {
        let name = staging_name("image", 1, "../../etc/passwd");
        assert_eq!(name, "image_1_passwd");
        let name = staging_name("image", 1, r"C:\Users\ann\..\face.png");
        assert_eq!(name, "image_1_face.png");
        assert!(!staging_name("im/age", 1, "..").contains('/'));
    }

    #[test]
    fn staging_names_differ_by_timestamp() {
        assert_ne!(staging_name("image", 1, "a.png"), staging_name("image", 2, "a.png"));
    }

    #[tokio::test]
    async fn dropping_a_staged_file_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _file) = create_unique(dir.path(), "image", "a.png").await.unwrap();
        let staged = StagedFile {
            path: path.clone(),
            file_name: "a.png".into(),
            content_type: "image/png".into(),
            len: 1,
        };
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropping_an_already_removed_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile {
            path: dir.path().join("gone.png"),
            file_name: "gone.png".into(),
            content_type: "image/png".into(),
            len: 1,
        };
        drop(staged);
    }

    #[tokio::test]
    async fn colliding_names_get_the_next_slot() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _a) = create_unique(dir.path(), "image", "a.png").await.unwrap();
        let (second, _b) = create_unique(dir.path(), "image", "a.png").await.unwrap();
        assert_ne!(first, second);
    }
}
