//! Server-rendered pages on top of the session API.

pub mod handlers;
pub mod render;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::page_routes().fallback(handlers::not_found)
}
