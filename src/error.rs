use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::ml::ModelError;

/// Error returned by every JSON handler. Renders as `{"error": "..."}`;
/// model failures also carry `"status": "error"`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    /// Body extraction failure; keeps the status axum chose.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Model(ModelError::NotLoaded(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Model(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
            ApiError::Model(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Same as the `From` conversion, except that bad feature vectors are
    /// reported as validation failures (422).
    pub fn validation(e: ModelError) -> Self {
        if e.is_input_error() {
            ApiError::Unprocessable(e.to_string())
        } else {
            ApiError::Model(e)
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Model(e) => {
                if status.is_server_error() {
                    error!(error = %e, "prediction failed");
                }
                json!({ "error": e.to_string(), "status": "error" })
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                json!({ "error": e.to_string() })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ModelKind;
    use http_body_util::BodyExt;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = res.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn missing_model_is_service_unavailable() {
        let (status, body) = body_of(ModelError::NotLoaded(ModelKind::Traffic).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Traffic model not loaded");
    }

    #[tokio::test]
    async fn bad_features_are_client_errors() {
        let (status, _) = body_of(ModelError::MissingFeature("hour".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            body_of(ApiError::validation(ModelError::FeatureCount { expected: 4, got: 0 })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "expected 4 features, got 0");
    }

    #[tokio::test]
    async fn internal_errors_keep_their_message() {
        let (status, body) = body_of(anyhow::anyhow!("db down").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "db down");
    }

    #[test]
    fn validation_keeps_model_outages() {
        let err = ApiError::validation(ModelError::NotLoaded(ModelKind::AirSensor));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
