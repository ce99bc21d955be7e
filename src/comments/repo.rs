use sqlx::PgPool;
use uuid::Uuid;

pub use super::repo_types::{Comment, CommentWithAuthor};

impl Comment {
    /// Single atomic insert; blog membership is the `blog_id` foreign key,
    /// so there is no separate parent update to keep in sync.
    pub async fn create(
        db: &PgPool,
        blog_id: Uuid,
        user_id: Uuid,
        parent_id: Option<Uuid>,
        content: &str,
    ) -> anyhow::Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (blog_id, user_id, parent_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, blog_id, user_id, parent_id, content, created_at
            "#,
        )
        .bind(blog_id)
        .bind(user_id)
        .bind(parent_id)
        .bind(content)
        .fetch_one(db)
        .await?;
        Ok(comment)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, blog_id, user_id, parent_id, content, created_at
              FROM comments
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(comment)
    }

    pub async fn find_with_author(
        db: &PgPool,
        id: Uuid,
    ) -> anyhow::Result<Option<CommentWithAuthor>> {
        let comment = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.blog_id, c.user_id, c.parent_id, c.content, c.created_at,
                   u.first_name AS author_first_name,
                   u.last_name  AS author_last_name,
                   u.email      AS author_email
              FROM comments c
              JOIN users u ON u.id = c.user_id
             WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(comment)
    }

    pub async fn list_for_blog(
        db: &PgPool,
        blog_id: Uuid,
    ) -> anyhow::Result<Vec<CommentWithAuthor>> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.blog_id, c.user_id, c.parent_id, c.content, c.created_at,
                   u.first_name AS author_first_name,
                   u.last_name  AS author_last_name,
                   u.email      AS author_email
              FROM comments c
              JOIN users u ON u.id = c.user_id
             WHERE c.blog_id = $1
             ORDER BY c.created_at ASC
            "#,
        )
        .bind(blog_id)
        .fetch_all(db)
        .await?;
        Ok(comments)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
