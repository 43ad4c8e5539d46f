use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;
use crate::storage::{ImageStore, S3ImageStore};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let images = Arc::new(S3ImageStore::new(&config.image_store).await?) as Arc<dyn ImageStore>;
        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;

        Ok(Self::from_parts(config, users, images))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            config,
            users,
            images,
        }
    }
}
