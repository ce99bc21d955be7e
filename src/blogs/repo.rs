use sqlx::PgPool;
use uuid::Uuid;

pub use super::repo_types::{Blog, BlogWithAuthor};

impl Blog {
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        title: &str,
        content: &str,
        image_key: Option<&str>,
    ) -> anyhow::Result<Blog> {
        let blog = sqlx::query_as::<_, Blog>(
            r#"
            INSERT INTO blogs (user_id, title, content, image_key)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, title, content, image_key, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(content)
        .bind(image_key)
        .fetch_one(db)
        .await?;
        Ok(blog)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Blog>> {
        let blog = sqlx::query_as::<_, Blog>(
            r#"
            SELECT id, user_id, title, content, image_key, created_at, updated_at
              FROM blogs
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(blog)
    }

    pub async fn find_with_author(db: &PgPool, id: Uuid) -> anyhow::Result<Option<BlogWithAuthor>> {
        let blog = sqlx::query_as::<_, BlogWithAuthor>(
            r#"
            SELECT b.id, b.user_id, b.title, b.content, b.image_key, b.created_at, b.updated_at,
                   u.first_name AS author_first_name,
                   u.last_name  AS author_last_name,
                   u.email      AS author_email
              FROM blogs b
              JOIN users u ON u.id = b.user_id
             WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(blog)
    }

    /// All blogs, newest first, with author fields.
    pub async fn list_with_authors(db: &PgPool) -> anyhow::Result<Vec<BlogWithAuthor>> {
        let blogs = sqlx::query_as::<_, BlogWithAuthor>(
            r#"
            SELECT b.id, b.user_id, b.title, b.content, b.image_key, b.created_at, b.updated_at,
                   u.first_name AS author_first_name,
                   u.last_name  AS author_last_name,
                   u.email      AS author_email
              FROM blogs b
              JOIN users u ON u.id = b.user_id
             ORDER BY b.created_at DESC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(blogs)
    }

    pub async fn page_with_authors(
        db: &PgPool,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<BlogWithAuthor>> {
        let blogs = sqlx::query_as::<_, BlogWithAuthor>(
            r#"
            SELECT b.id, b.user_id, b.title, b.content, b.image_key, b.created_at, b.updated_at,
                   u.first_name AS author_first_name,
                   u.last_name  AS author_last_name,
                   u.email      AS author_email
              FROM blogs b
              JOIN users u ON u.id = b.user_id
             ORDER BY b.created_at DESC
             LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(blogs)
    }

    /// Case-insensitive substring match on the title.
    pub async fn search_with_authors(
        db: &PgPool,
        title: &str,
    ) -> anyhow::Result<Vec<BlogWithAuthor>> {
        let pattern = format!("%{}%", title);
        let blogs = sqlx::query_as::<_, BlogWithAuthor>(
            r#"
            SELECT b.id, b.user_id, b.title, b.content, b.image_key, b.created_at, b.updated_at,
                   u.first_name AS author_first_name,
                   u.last_name  AS author_last_name,
                   u.email      AS author_email
              FROM blogs b
              JOIN users u ON u.id = b.user_id
             WHERE b.title ILIKE $1
             ORDER BY b.created_at DESC
            "#,
        )
        .bind(pattern)
        .fetch_all(db)
        .await?;
        Ok(blogs)
    }

    pub async fn update(db: &PgPool, blog: &Blog) -> anyhow::Result<Blog> {
        let blog = sqlx::query_as::<_, Blog>(
            r#"
            UPDATE blogs
               SET title = $2, content = $3, image_key = $4, updated_at = now()
             WHERE id = $1
            RETURNING id, user_id, title, content, image_key, created_at, updated_at
            "#,
        )
        .bind(blog.id)
        .bind(&blog.title)
        .bind(&blog.content)
        .bind(&blog.image_key)
        .fetch_one(db)
        .await?;
        Ok(blog)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
