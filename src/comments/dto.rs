use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::CommentWithAuthor;
use crate::blogs::dto::Author;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub author: Author,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CommentWithAuthor> for CommentResponse {
    fn from(row: CommentWithAuthor) -> Self {
        Self {
            id: row.id,
            blog_id: row.blog_id,
            parent_id: row.parent_id,
            content: row.content,
            author: Author {
                id: row.user_id,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                email: row.author_email,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleCommentResponse {
    pub success: bool,
    pub message: String,
    pub comment: CommentResponse,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub success: bool,
    pub message: String,
    pub comments: Vec<CommentResponse>,
}
