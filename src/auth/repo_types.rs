use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record as stored. `password_hash` never leaves this crate; the
/// public projection is `dto::PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub reset_code: Option<String>,
    pub reset_code_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields required to insert a user; everything else is defaulted by the
/// store (`is_admin = false`, no reset code, fresh timestamps).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}
