use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    auth::repo::{PgUserStore, UserStore},
    config::AppConfig,
    mail::{Mailer, SmtpMailer},
    storage::{S3Storage, StorageClient},
};

/// Shared application state: the connection pool, the parsed config, and
/// the collaborator trait objects behind the credential, image and email
/// flows.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage =
            Arc::new(S3Storage::connect(&config.storage).await?) as Arc<dyn StorageClient>;
        let mailer = Arc::new(SmtpMailer::new(&config.smtp)?) as Arc<dyn Mailer>;
        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;

        Ok(Self {
            db,
            config,
            users,
            storage,
            mailer,
        })
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        storage: Arc<dyn StorageClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            config,
            users,
            storage,
            mailer,
        }
    }
}
