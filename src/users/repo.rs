use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, PersistenceError};
use crate::users::repo_types::{User, UserFields};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already in use")]
    DuplicateEmail,
    #[error("database rejected write: {0}")]
    Rejected(String),
    #[error("database unavailable: {0}")]
    Unavailable(anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
            other => StoreError::Unavailable(other.into()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => PersistenceError::DuplicateEmail.into(),
            StoreError::Rejected(msg) => PersistenceError::Rejected(msg).into(),
            StoreError::Unavailable(e) => AppError::Internal(e),
        }
    }
}

/// Persistence seam for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All records in insertion order.
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn insert(&self, fields: &UserFields) -> Result<User, StoreError>;
    /// Overwrites the mutable columns and returns the image URL held before the write.
    /// `Ok(None)` means no record had that id and nothing changed.
    async fn update(&self, id: Uuid, fields: &UserFields) -> Result<Option<String>, StoreError>;
    /// Removes the record and hands back what was deleted.
    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, image, created
            FROM users
            ORDER BY created ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, image, created
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, fields: &UserFields) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, phone, image, created
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.image)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, fields: &UserFields) -> Result<Option<String>, StoreError> {
        let previous = sqlx::query_scalar::<_, String>(
            r#"
            WITH prev AS (
                SELECT id, image FROM users WHERE id = $1 FOR UPDATE
            )
            UPDATE users u
               SET name = $2, email = $3, phone = $4, image = $5
              FROM prev
             WHERE u.id = prev.id
            RETURNING prev.image
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.image)
        .fetch_optional(&self.db)
        .await?;
        Ok(previous)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
            WHERE id = $1
            RETURNING id, name, email, phone, image, created
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}
