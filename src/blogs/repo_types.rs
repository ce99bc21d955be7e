use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Blog post as stored. `user_id` is the owner and the authorization key
/// for edit/delete; `image_key` points into object storage.
#[derive(Debug, Clone, FromRow)]
pub struct Blog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub image_key: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Blog row joined with its author's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct BlogWithAuthor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub image_key: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_email: String,
}
