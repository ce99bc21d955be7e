use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{Author, BlogResponse, BlogsResponse, PageQuery, SearchQuery, SingleBlogResponse},
    repo::{Blog, BlogWithAuthor},
};
use crate::{
    auth::{authz, extractors::AuthUser},
    error::{ApiMessage, Error},
    state::AppState,
    storage::StorageClient,
};

const RESULTS_PER_PAGE: i64 = 7;
const IMAGE_URL_TTL_SECS: u64 = 30 * 60;
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs))
        .route("/blogs/paginated", get(paginate_blogs))
        .route("/blogs/search", get(search_blogs))
        .route("/blogs/:id", get(get_blog))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs", post(create_blog))
        .route("/blogs/:id", put(edit_blog).delete(delete_blog))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Multipart form shared by create and edit: text fields `title` and
/// `content`, optional file field `image`.
#[derive(Default)]
struct BlogForm {
    title: Option<String>,
    content: Option<String>,
    image: Option<(Bytes, String)>,
}

async fn read_blog_form(mut mp: Multipart) -> Result<BlogForm, Error> {
    let mut form = BlogForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("title") => {
                form.title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| Error::Validation(format!("invalid title field: {e}")))?,
                );
            }
            Some("content") => {
                form.content = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| Error::Validation(format!("invalid content field: {e}")))?,
                );
            }
            Some("image") => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(format!("invalid image field: {e}")))?;
                form.image = Some((data, content_type));
            }
            _ => {}
        }
    }
    Ok(form)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

async fn upload_image(
    storage: &dyn StorageClient,
    data: Bytes,
    content_type: &str,
) -> Result<String, Error> {
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| Error::Validation(format!("unsupported image type: {content_type}")))?;
    let key = format!("blogs/{}.{}", Uuid::new_v4(), ext);
    storage.put_object(&key, data, content_type).await?;
    Ok(key)
}

async fn to_response(state: &AppState, row: BlogWithAuthor) -> Result<BlogResponse, Error> {
    let image_url = match &row.image_key {
        Some(key) => Some(state.storage.presign_get(key, IMAGE_URL_TTL_SECS).await?),
        None => None,
    };
    Ok(BlogResponse {
        id: row.id,
        title: row.title,
        content: row.content,
        image_url,
        author: Author {
            id: row.user_id,
            first_name: row.author_first_name,
            last_name: row.author_last_name,
            email: row.author_email,
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn fetch_response(state: &AppState, id: Uuid) -> Result<BlogResponse, Error> {
    let row = Blog::find_with_author(&state.db, id)
        .await?
        .ok_or(Error::NotFound("blog"))?;
    to_response(state, row).await
}

#[instrument(skip(state, mp))]
pub async fn create_blog(
    State(state): State<AppState>,
    actor: AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, Json<SingleBlogResponse>), Error> {
    let form = read_blog_form(mp).await?;
    let title = form.title.unwrap_or_default();
    let content = form.content.unwrap_or_default();
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(Error::Validation("title and content are required".into()));
    }

    let image_key = match form.image {
        Some((data, content_type)) => {
            Some(upload_image(state.storage.as_ref(), data, &content_type).await?)
        }
        None => None,
    };

    let blog = Blog::create(&state.db, actor.id, &title, &content, image_key.as_deref()).await?;
    let blog = fetch_response(&state, blog.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(SingleBlogResponse {
            success: true,
            message: "blog created successfully".into(),
            blog,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_blogs(State(state): State<AppState>) -> Result<Json<BlogsResponse>, Error> {
    let rows = Blog::list_with_authors(&state.db).await?;
    let mut blogs = Vec::with_capacity(rows.len());
    for row in rows {
        blogs.push(to_response(&state, row).await?);
    }
    Ok(Json(BlogsResponse {
        success: true,
        message: "blogs fetched successfully".into(),
        blogs,
    }))
}

#[instrument(skip(state))]
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SingleBlogResponse>, Error> {
    let blog = fetch_response(&state, id).await?;
    Ok(Json(SingleBlogResponse {
        success: true,
        message: "blog fetched successfully".into(),
        blog,
    }))
}

#[instrument(skip(state))]
pub async fn paginate_blogs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<BlogsResponse>, Error> {
    let page = query.page.max(1);
    let rows =
        Blog::page_with_authors(&state.db, RESULTS_PER_PAGE, (page - 1) * RESULTS_PER_PAGE).await?;
    let mut blogs = Vec::with_capacity(rows.len());
    for row in rows {
        blogs.push(to_response(&state, row).await?);
    }
    Ok(Json(BlogsResponse {
        success: true,
        message: "blogs fetched successfully".into(),
        blogs,
    }))
}

#[instrument(skip(state))]
pub async fn search_blogs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<BlogsResponse>, Error> {
    let rows = Blog::search_with_authors(&state.db, &query.title).await?;
    let mut blogs = Vec::with_capacity(rows.len());
    for row in rows {
        blogs.push(to_response(&state, row).await?);
    }
    Ok(Json(BlogsResponse {
        success: true,
        message: "blogs fetched successfully".into(),
        blogs,
    }))
}

#[instrument(skip(state, mp))]
pub async fn edit_blog(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<SingleBlogResponse>, Error> {
    let mut blog = Blog::find(&state.db, id)
        .await?
        .ok_or(Error::NotFound("blog"))?;
    authz::ensure_owner(blog.user_id, &actor)?;

    let form = read_blog_form(mp).await?;
    if let Some(title) = form.title.filter(|v| !v.trim().is_empty()) {
        blog.title = title;
    }
    if let Some(content) = form.content.filter(|v| !v.trim().is_empty()) {
        blog.content = content;
    }
    if let Some((data, content_type)) = form.image {
        let new_key = upload_image(state.storage.as_ref(), data, &content_type).await?;
        if let Some(old_key) = blog.image_key.replace(new_key) {
            if let Err(e) = state.storage.delete_object(&old_key).await {
                warn!(error = %e, key = %old_key, "failed to delete replaced image");
            }
        }
    }

    Blog::update(&state.db, &blog).await?;
    let blog = fetch_response(&state, id).await?;
    Ok(Json(SingleBlogResponse {
        success: true,
        message: "blog updated successfully".into(),
        blog,
    }))
}

#[instrument(skip(state))]
pub async fn delete_blog(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiMessage>, Error> {
    let blog = Blog::find(&state.db, id)
        .await?
        .ok_or(Error::NotFound("blog"))?;
    authz::ensure_owner(blog.user_id, &actor)?;

    Blog::delete(&state.db, id).await?;
    if let Some(key) = &blog.image_key {
        if let Err(e) = state.storage.delete_object(key).await {
            warn!(error = %e, key = %key, "failed to delete blog image");
        }
    }

    Ok(Json(ApiMessage::ok("blog deleted successfully")))
}
