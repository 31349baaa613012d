//! Unauthenticated prediction API. Nothing here touches the database.

pub mod dto;
pub mod handlers;

use crate::state::PublicState;
use axum::Router;

pub fn router() -> Router<PublicState> {
    Router::new()
        .merge(handlers::info_routes())
        .merge(handlers::raw_routes())
        .merge(handlers::v1_routes())
}
