use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

/// Reasons the record store refused a write.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("email already in use")]
    DuplicateEmail,
    #[error("write rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} is required")]
    Validation(&'static str),
    #[error("image upload failed: {0}")]
    Upload(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Upload(_) => "upload_error",
            AppError::Persistence(_) => "persistence_error",
            AppError::NotFound => "not_found",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upload(_) => StatusCode::BAD_GATEWAY,
            AppError::Persistence(_) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show a user. Never includes remote or database error detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(field) => format!("{} is required", capitalize(field)),
            AppError::Upload(_) => "Image upload failed, please try again".into(),
            AppError::Persistence(PersistenceError::DuplicateEmail) => {
                "A user with this email already exists".into()
            }
            AppError::Persistence(PersistenceError::Rejected(_)) => "Could not save user".into(),
            AppError::NotFound => "User not found".into(),
            AppError::Internal(_) => "Something went wrong".into(),
        }
    }

    /// Whether the failure is reported through a flash + redirect rather than an error body.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        } else {
            warn!(error = %self, code = self.code(), "request rejected");
        }
        let body = ErrorBody {
            kind: "danger",
            code: self.code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
