use axum::Router;

use crate::state::AppState;

pub(crate) mod dto;
pub mod handlers;
pub mod repo;
mod repo_types;

pub fn router() -> Router<AppState> {
    handlers::read_routes().merge(handlers::write_routes())
}
