use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
#[cfg(test)]
pub mod memory;
pub mod password;
pub mod repo;
mod repo_types;
pub mod services;
pub mod tokens;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::admin_routes())
        .merge(handlers::me_routes())
}
