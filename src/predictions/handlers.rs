use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{HistoryQuery, HistoryResponse, PageResponse, MAX_PAGE};
use super::repo;
use super::repo_types::{NewPrediction, PredictionCounts, PredictionType};
use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::ApiJson,
    ml::{
        features::missing_keys, AirQualityPrediction, EnergyPrediction, ModelKind, Outcome,
        TrafficPrediction,
    },
    state::AppState,
};

pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predict/traffic", post(predict_traffic))
        .route("/api/predict/air-quality", post(predict_air_quality))
        .route("/api/predict/energy", post(predict_energy))
}

pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/api/history", get(list_history))
        .route("/api/history/:prediction_type", get(history_by_type))
        .route("/api/stats/dashboard", get(stats_dashboard))
}

fn require_features(payload: &Map<String, Value>, kind: ModelKind) -> Result<(), ApiError> {
    let missing = missing_keys(payload, kind.feature_names());
    if missing.is_empty() {
        return Ok(());
    }
    warn!(model = %kind.as_str(), missing = ?missing, "prediction request missing features");
    Err(ApiError::BadRequest(format!(
        "Missing required fields: {}",
        missing.join(", ")
    )))
}

async fn record(
    state: &AppState,
    user_id: Uuid,
    prediction_type: PredictionType,
    payload: Map<String, Value>,
    prediction_result: f64,
    confidence: Option<f64>,
) -> Result<(), ApiError> {
    let row = repo::insert(
        &state.db,
        &NewPrediction {
            user_id,
            prediction_type,
            input_data: Value::Object(payload),
            prediction_result,
            confidence,
        },
    )
    .await?;
    info!(
        user_id = %user_id,
        prediction_id = %row.id,
        kind = prediction_type.as_str(),
        result = prediction_result,
        "prediction stored"
    );
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn predict_traffic(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<Map<String, Value>>,
) -> Result<Json<Outcome<TrafficPrediction>>, ApiError> {
    require_features(&payload, ModelKind::Traffic)?;
    let user_id = auth.account(&state.db).await?.id;
    let result = state.models.predict_traffic(&payload)?;
    record(
        &state,
        user_id,
        PredictionType::Traffic,
        payload,
        result.prediction as f64,
        Some(result.confidence),
    )
    .await?;
    Ok(Json(Outcome::Success(result)))
}

#[instrument(skip(state, payload))]
pub async fn predict_air_quality(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<Map<String, Value>>,
) -> Result<Json<Outcome<AirQualityPrediction>>, ApiError> {
    require_features(&payload, ModelKind::AirQuality)?;
    let user_id = auth.account(&state.db).await?.id;
    let result = state.models.predict_air_quality(&payload)?;
    record(&state, user_id, PredictionType::AirQuality, payload, result.aqi, None).await?;
    Ok(Json(Outcome::Success(result)))
}

#[instrument(skip(state, payload))]
pub async fn predict_energy(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<Map<String, Value>>,
) -> Result<Json<Outcome<EnergyPrediction>>, ApiError> {
    require_features(&payload, ModelKind::Energy)?;
    let user_id = auth.account(&state.db).await?.id;
    let result = state.models.predict_energy(&payload)?;
    record(
        &state,
        user_id,
        PredictionType::Energy,
        payload,
        result.consumption_kwh,
        None,
    )
    .await?;
    Ok(Json(Outcome::Success(result)))
}

#[instrument(skip(state))]
pub async fn history_by_type(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(prediction_type): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let kind = PredictionType::parse(&prediction_type).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown prediction type: {prediction_type}"))
    })?;
    let user_id = auth.account(&state.db).await?.id;
    let rows = repo::list_by_user(&state.db, user_id, Some(kind), None, 0).await?;
    Ok(Json(HistoryResponse {
        data: rows.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn list_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<PageResponse>, ApiError> {
    let kind = match q.kind.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            PredictionType::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown prediction type: {raw}")))?,
        ),
    };
    let limit = q.limit.clamp(1, MAX_PAGE);
    let offset = q.offset.max(0);
    let user_id = auth.account(&state.db).await?.id;
    let rows = repo::list_by_user(&state.db, user_id, kind, Some(limit), offset).await?;
    Ok(Json(PageResponse {
        data: rows.into_iter().map(Into::into).collect(),
        limit,
        offset,
    }))
}

#[instrument(skip(state))]
pub async fn stats_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PredictionCounts>, ApiError> {
    let user = auth.account(&state.db).await?;
    Ok(Json(repo::counts_by_user(&state.db, user.id).await?))
}
