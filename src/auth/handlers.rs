use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        ChangePasswordRequest, LoginRequest, LoginResponse, PublicUser, RegisterRequest,
        RequestCodeRequest, ResetPasswordRequest, UpdateProfileRequest, UserResponse,
        UsersResponse,
    },
    extractors::AuthUser,
    jwt::JwtKeys,
    services,
};
use crate::{
    error::{ApiMessage, Error},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users", get(list_users))
        .route("/users/password", put(change_password))
        .route("/users/request-code", post(request_code))
        .route("/users/reset-password", post(reset_password))
        .route(
            "/users/:id",
            get(get_profile).put(edit_user).delete(delete_user),
        )
        .route("/users/:id/role", put(update_role))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiMessage>), Error> {
    services::register(state.users.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::ok("user created successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    let keys = JwtKeys::from_ref(&state);
    let (token, user) = services::login(state.users.as_ref(), &keys, &payload).await?;
    Ok(Json(LoginResponse {
        success: true,
        message: "user logged in successfully".into(),
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, Error> {
    let users = state.users.list().await?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.iter().map(PublicUser::from).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    _actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, Error> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(Error::NotFound("user"))?;
    Ok(Json(UserResponse {
        success: true,
        message: "user details retrieved successfully".into(),
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn edit_user(
    State(state): State<AppState>,
    _actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, Error> {
    let user = services::update_profile(state.users.as_ref(), id, payload).await?;
    Ok(Json(UserResponse {
        success: true,
        message: "user updated successfully".into(),
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    _actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiMessage>, Error> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or(Error::NotFound("user"))?;
    state.users.delete(id).await?;
    Ok(Json(ApiMessage::ok("user deleted successfully")))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiMessage>, Error> {
    services::change_password(state.users.as_ref(), actor.id, &payload).await?;
    Ok(Json(ApiMessage::ok("password changed successfully")))
}

#[instrument(skip(state, payload))]
pub async fn request_code(
    State(state): State<AppState>,
    Json(payload): Json<RequestCodeRequest>,
) -> Result<Json<ApiMessage>, Error> {
    services::request_reset_code(state.users.as_ref(), state.mailer.as_ref(), &payload.email)
        .await?;
    Ok(Json(ApiMessage::ok("verification code sent to your email")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiMessage>, Error> {
    services::reset_password(
        state.users.as_ref(),
        &payload.email,
        &payload.code,
        &payload.new_password,
    )
    .await?;
    Ok(Json(ApiMessage::ok("password changed successfully")))
}

#[instrument(skip(state))]
pub async fn update_role(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, Error> {
    let user = services::toggle_role(state.users.as_ref(), &actor, id).await?;
    Ok(Json(UserResponse {
        success: true,
        message: "user role updated successfully".into(),
        user: PublicUser::from(&user),
    }))
}
