mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub use repo_types::{Prediction, PredictionCounts, PredictionType};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::predict_routes())
        .merge(handlers::history_routes())
}
