use std::path::Path;

use axum::extract::Multipart;
use tracing::debug;

use crate::error::AppError;
use crate::images::{staging::drain, StagedFile};

/// Multipart submission of the add and edit forms.
#[derive(Debug, Default)]
pub struct UserForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Current image URL echoed back by the edit form.
    pub old_image: Option<String>,
    pub image: Option<StagedFile>,
}

/// Text fields after the required-presence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactFields {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl UserForm {
    /// Reads every part, staging the first non-empty `image` file under `upload_dir`.
    pub async fn read(mut mp: Multipart, upload_dir: &Path) -> Result<Self, AppError> {
        let mut form = UserForm::default();
        while let Some(mut field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::Upload(format!("read multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();

            match (name.as_str(), is_file) {
                ("image", true) if form.image.is_none() => {
                    form.image = StagedFile::stage(upload_dir, field).await?;
                }
                (_, true) => {
                    debug!(field = %name, "ignoring extra file part");
                    drain(&mut field).await?;
                }
                (text, false) => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::Upload(format!("read multipart body: {e}")))?;
                    match text {
                        "name" => form.name = Some(value),
                        "email" => form.email = Some(value),
                        "phone" => form.phone = Some(value),
                        "old_image" => form.old_image = Some(value),
                        _ => debug!(field = %text, "ignoring unknown form field"),
                    }
                }
            }
        }
        Ok(form)
    }

    /// Name, email and phone, trimmed; blank counts as missing.
    pub fn contact(&self) -> Result<ContactFields, AppError> {
        Ok(ContactFields {
            name: required(&self.name, "name")?,
            email: required(&self.email, "email")?,
            phone: required(&self.phone, "phone")?,
        })
    }

    pub fn old_image(&self) -> Option<&str> {
        self.old_image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Validation(field))
}
