use axum::Router;

use crate::state::AppState;

pub(crate) mod authz;
mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
