use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod repo;
pub(crate) mod repo_types;
pub mod services;
pub mod session;

pub use dto::{JwtKeys, PublicUser};
pub use extractors::AuthUser;
pub use repo_types::User;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
