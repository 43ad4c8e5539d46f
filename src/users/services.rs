use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::UserForm;
use super::repo_types::{User, UserFields};
use crate::error::AppError;
use crate::images;
use crate::state::AppState;

/// Outcome of an update, which silently tolerates unknown ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { image: String },
    Missing,
}

pub async fn list_users(st: &AppState) -> Result<Vec<User>, AppError> {
    Ok(st.users.list().await?)
}

pub async fn find_user(st: &AppState, id: Uuid) -> Result<Option<User>, AppError> {
    Ok(st.users.find(id).await?)
}

/// Uploads the image, then inserts the record.
///
/// The uploaded image is deleted again if the insert is refused.
#[instrument(skip(st, form))]
pub async fn create_user(st: &AppState, form: UserForm) -> Result<User, AppError> {
    let contact = form.contact()?;
    let staged = form.image.ok_or(AppError::Validation("image"))?;
    let image = images::forward(st.images.as_ref(), staged, st.config.upload.timeout).await?;

    let fields = UserFields {
        name: contact.name,
        email: contact.email,
        phone: contact.phone,
        image,
    };
    match st.users.insert(&fields).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "user created");
            Ok(user)
        }
        Err(e) => {
            warn!(error = %e, email = %fields.email, "insert failed; discarding uploaded image");
            images::discard(st.images.as_ref(), &fields.image).await;
            Err(e.into())
        }
    }
}

/// Rewrites the record's fields. Without a new file the client's `old_image` is kept.
///
/// When a new image replaces an old one the old remote object is deleted.
#[instrument(skip(st, form))]
pub async fn update_user(st: &AppState, id: Uuid, form: UserForm) -> Result<UpdateOutcome, AppError> {
    let contact = form.contact()?;
    let fallback = form.old_image().map(str::to_string);

    let uploaded = match form.image {
        Some(staged) => {
            Some(images::forward(st.images.as_ref(), staged, st.config.upload.timeout).await?)
        }
        None => None,
    };
    let image = match (&uploaded, fallback) {
        (Some(url), _) => url.clone(),
        (None, Some(old)) => old,
        (None, None) => return Err(AppError::Validation("image")),
    };

    let fields = UserFields {
        name: contact.name,
        email: contact.email,
        phone: contact.phone,
        image,
    };

    let previous = match st.users.update(id, &fields).await {
        Ok(previous) => previous,
        Err(e) => {
            if let Some(url) = &uploaded {
                warn!(error = %e, %id, "update failed; discarding uploaded image");
                images::discard(st.images.as_ref(), url).await;
            }
            return Err(e.into());
        }
    };

    match previous {
        None => {
            warn!(%id, "update for unknown user ignored");
            if let Some(url) = &uploaded {
                images::discard(st.images.as_ref(), url).await;
            }
            Ok(UpdateOutcome::Missing)
        }
        Some(old) => {
            if uploaded.is_some() && old != fields.image {
                images::discard(st.images.as_ref(), &old).await;
            }
            info!(user_id = %id, "user updated");
            Ok(UpdateOutcome::Updated { image: fields.image })
        }
    }
}

/// Removes the record, then its remote image on a best-effort basis.
#[instrument(skip(st))]
pub async fn delete_user(st: &AppState, id: Uuid) -> Result<User, AppError> {
    let user = st.users.delete(id).await?.ok_or(AppError::NotFound)?;
    images::discard(st.images.as_ref(), &user.image).await;
    info!(user_id = %user.id, "user deleted");
    Ok(user)
}
