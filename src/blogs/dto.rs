use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct BlogResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Presigned, short-lived download URL for the attached image.
    pub image_url: Option<String>,
    pub author: Author,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct BlogsResponse {
    pub success: bool,
    pub message: String,
    pub blogs: Vec<BlogResponse>,
}

#[derive(Debug, Serialize)]
pub struct SingleBlogResponse {
    pub success: bool,
    pub message: String,
    pub blog: BlogResponse,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub title: String,
}
