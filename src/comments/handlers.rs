use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CommentResponse, CommentsResponse, CreateCommentRequest, SingleCommentResponse},
    repo::Comment,
};
use crate::{
    auth::{authz, extractors::AuthUser},
    blogs::repo::Blog,
    error::{ApiMessage, Error},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/blogs/:id/comments",
            post(create_comment).get(list_comments),
        )
        .route("/comments/:id", delete(delete_comment))
}

#[instrument(skip(state, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(blog_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<SingleCommentResponse>), Error> {
    if payload.content.trim().is_empty() {
        return Err(Error::Validation("content is required".into()));
    }

    Blog::find(&state.db, blog_id)
        .await?
        .ok_or(Error::NotFound("blog"))?;

    if let Some(parent_id) = payload.parent_id {
        let parent = Comment::find(&state.db, parent_id)
            .await?
            .ok_or(Error::NotFound("comment"))?;
        if parent.blog_id != blog_id {
            return Err(Error::Validation(
                "parent comment does not belong to this blog".into(),
            ));
        }
    }

    let comment = Comment::create(
        &state.db,
        blog_id,
        actor.id,
        payload.parent_id,
        &payload.content,
    )
    .await?;

    let comment = Comment::find_with_author(&state.db, comment.id)
        .await?
        .map(CommentResponse::from)
        .ok_or(Error::NotFound("comment"))?;

    Ok((
        StatusCode::CREATED,
        Json(SingleCommentResponse {
            success: true,
            message: "comment added successfully".into(),
            comment,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<CommentsResponse>, Error> {
    let comments = Comment::list_for_blog(&state.db, blog_id).await?;
    Ok(Json(CommentsResponse {
        success: true,
        message: "comments fetched successfully".into(),
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiMessage>, Error> {
    let comment = Comment::find(&state.db, id)
        .await?
        .ok_or(Error::NotFound("comment"))?;
    authz::ensure_owner_or_admin(comment.user_id, &actor)?;

    Comment::delete(&state.db, id).await?;
    Ok(Json(ApiMessage::ok("comment deleted successfully")))
}
