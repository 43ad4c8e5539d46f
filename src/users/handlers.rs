use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::UserForm;
use super::services::{self, UpdateOutcome};
use crate::error::AppError;
use crate::flash::{Flash, FlashRedirect, PendingFlash};
use crate::state::AppState;
use crate::views;

pub fn user_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/add", get(add_form).post(create_user))
        .route("/edit/:id", get(edit_form))
        .route("/update/:id", post(update_user))
        .route("/delete/:id", get(delete_user))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// --- pages ---

#[instrument(skip(state, flash))]
pub async fn list_users(
    State(state): State<AppState>,
    PendingFlash(flash): PendingFlash,
) -> Result<Html<String>, AppError> {
    let users = services::list_users(&state).await?;
    Ok(Html(views::index(&users, flash.as_ref())))
}

pub async fn add_form(PendingFlash(flash): PendingFlash) -> Html<String> {
    Html(views::add_user(flash.as_ref()))
}

#[instrument(skip(state, flash))]
pub async fn edit_form(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    PendingFlash(flash): PendingFlash,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return FlashRedirect::to("/").into_response();
    };
    match services::find_user(&state, id).await {
        Ok(Some(user)) => Html(views::edit_user(&user, flash.as_ref())).into_response(),
        Ok(None) => FlashRedirect::to("/").into_response(),
        Err(e) => {
            error!(error = %e, code = e.code(), user_id = %id, "edit lookup failed; back to list");
            FlashRedirect::to("/").into_response()
        }
    }
}

// --- actions ---

#[instrument(skip(state, mp))]
pub async fn create_user(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<FlashRedirect, AppError> {
    let created = async {
        let form = UserForm::read(mp, &state.config.upload.dir).await?;
        services::create_user(&state, form).await
    }
    .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, "create handled");
            Ok(FlashRedirect::with("/", Flash::success("User added successfully")))
        }
        Err(e) => recover(e, "/add"),
    }
}

#[instrument(skip(state, mp))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    mp: Multipart,
) -> Result<FlashRedirect, AppError> {
    let Some(id) = parse_id(&raw_id) else {
        warn!(id = %raw_id, "update for malformed id ignored");
        return Ok(FlashRedirect::with("/", Flash::success("User updated successfully")));
    };

    let updated = async {
        let form = UserForm::read(mp, &state.config.upload.dir).await?;
        services::update_user(&state, id, form).await
    }
    .await;

    match updated {
        Ok(outcome) => {
            if let UpdateOutcome::Updated { image } = outcome {
                info!(user_id = %id, %image, "update handled");
            }
            Ok(FlashRedirect::with("/", Flash::success("User updated successfully")))
        }
        Err(e) => recover(e, format!("/edit/{id}")),
    }
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<FlashRedirect, AppError> {
    let deleted = match parse_id(&raw_id) {
        Some(id) => services::delete_user(&state, id).await,
        None => Err(AppError::NotFound),
    };
    match deleted {
        Ok(_) => Ok(FlashRedirect::with("/", Flash::success("User deleted successfully"))),
        Err(e) => recover(e, "/"),
    }
}

/// Turns a recoverable failure into a danger flash on `back_to`; anything else is returned as-is.
fn recover(err: AppError, back_to: impl Into<String>) -> Result<FlashRedirect, AppError> {
    if err.is_recoverable() {
        warn!(error = %err, code = err.code(), "request failed; redirecting with flash");
        Ok(FlashRedirect::with(back_to, Flash::danger(err.public_message())))
    } else {
        Err(err)
    }
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}
