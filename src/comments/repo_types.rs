use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Comment as stored. `parent_id` points at another comment on the same
/// blog when this is a threaded reply.
#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: OffsetDateTime,
}

/// Comment row joined with its author's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct CommentWithAuthor {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_email: String,
}
