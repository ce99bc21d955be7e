use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub use super::repo_types::{NewUser, User};

/// Identity store behind the credential flows. Production uses Postgres;
/// the service tests swap in an in-memory implementation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    /// Persist the full mutable state of an existing record.
    async fn update(&self, user: &User) -> anyhow::Result<User>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
}

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
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, password_hash, is_admin,
                   reset_code, reset_code_expires_at, created_at, updated_at
              FROM users
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, password_hash, is_admin,
                   reset_code, reset_code_expires_at, created_at, updated_at
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, password_hash, is_admin,
                   reset_code, reset_code_expires_at, created_at, updated_at
              FROM users
             ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, first_name, last_name, password_hash, is_admin,
                      reset_code, reset_code_expires_at, created_at, updated_at
            "#,
        )
        .bind(&new.email)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = $2, first_name = $3, last_name = $4, password_hash = $5,
                   is_admin = $6, reset_code = $7, reset_code_expires_at = $8,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, email, first_name, last_name, password_hash, is_admin,
                      reset_code, reset_code_expires_at, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(&user.reset_code)
        .bind(user.reset_code_expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
