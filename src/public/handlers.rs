use std::collections::BTreeMap;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, instrument, warn};

use super::dto::{
    recommendations, AirQualityReading, AirQualityResponse, BatchResponse, EnergyRequest,
    EnergyResponse, RawCo, RawEnergy, RawTraffic, RootResponse, TrafficResponse, MAX_BATCH,
};
use crate::{
    error::ApiError,
    extract::ApiJson,
    ml::{manager::VehicleCounts, ModelKind},
    state::PublicState,
};

const PUBLIC_MODELS: [ModelKind; 3] = [
    ModelKind::AirSensor,
    ModelKind::EnergyLoad,
    ModelKind::TrafficFlow,
];

pub fn info_routes() -> Router<PublicState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

/// Positional array endpoints.
pub fn raw_routes() -> Router<PublicState> {
    Router::new()
        .route("/air/predict", post(raw_air))
        .route("/energy/predict", post(raw_energy))
        .route("/traffic/predict", post(raw_traffic))
}

pub fn v1_routes() -> Router<PublicState> {
    Router::new()
        .route("/api/v1/predict/air-quality", post(predict_air_quality))
        .route("/api/v1/predict/traffic", post(predict_traffic))
        .route("/api/v1/predict/energy", post(predict_energy))
        .route("/api/v1/predict/batch/air-quality", post(batch_air_quality))
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Smart City ML API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health(State(state): State<PublicState>) -> Json<Value> {
    let models_loaded: BTreeMap<&str, bool> = PUBLIC_MODELS
        .iter()
        .map(|kind| (kind.as_str(), state.models.is_loaded(*kind)))
        .collect();
    let status = if models_loaded.values().all(|loaded| *loaded) {
        "healthy"
    } else {
        "degraded"
    };
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "status": status,
        "models_loaded": models_loaded,
        "timestamp": timestamp,
    }))
}

#[instrument(skip(state, readings))]
pub async fn raw_air(
    State(state): State<PublicState>,
    ApiJson(readings): ApiJson<Vec<f64>>,
) -> Result<Json<RawCo>, ApiError> {
    let co = state
        .models
        .predict_raw(ModelKind::AirSensor, &readings)
        .map_err(ApiError::validation)?;
    Ok(Json(RawCo { predicted_co: co }))
}

#[instrument(skip(state, features))]
pub async fn raw_energy(
    State(state): State<PublicState>,
    ApiJson(features): ApiJson<Vec<f64>>,
) -> Result<Json<RawEnergy>, ApiError> {
    let energy = state
        .models
        .predict_raw(ModelKind::EnergyLoad, &features)
        .map_err(ApiError::validation)?;
    Ok(Json(RawEnergy {
        predicted_energy: energy,
    }))
}

#[instrument(skip(state, features))]
pub async fn raw_traffic(
    State(state): State<PublicState>,
    ApiJson(features): ApiJson<Vec<f64>>,
) -> Result<Json<RawTraffic>, ApiError> {
    let class = state
        .models
        .predict_raw(ModelKind::TrafficFlow, &features)
        .map_err(ApiError::validation)?;
    Ok(Json(RawTraffic {
        traffic_level: class as i64,
    }))
}

fn air_quality(state: &PublicState, reading: &AirQualityReading) -> Result<AirQualityResponse, ApiError> {
    let x = reading.validate()?;
    let co = state
        .models
        .predict_co_level(&x)
        .map_err(ApiError::validation)?;
    Ok(AirQualityResponse::from_co(co))
}

#[instrument(skip(state, reading))]
pub async fn predict_air_quality(
    State(state): State<PublicState>,
    ApiJson(reading): ApiJson<AirQualityReading>,
) -> Result<Json<AirQualityResponse>, ApiError> {
    let response = air_quality(&state, &reading)?;
    if response.alert {
        warn!(co = response.prediction, "CO level above alert threshold");
    }
    Ok(Json(response))
}

#[instrument(skip(state))]
pub async fn predict_traffic(
    State(state): State<PublicState>,
    ApiJson(counts): ApiJson<VehicleCounts>,
) -> Result<Json<TrafficResponse>, ApiError> {
    let p = state
        .models
        .predict_traffic_flow(&counts)
        .map_err(ApiError::validation)?;
    debug!(level = p.label, total = p.total_vehicles, "traffic flow classified");
    Ok(Json(TrafficResponse {
        prediction: p.class,
        traffic_level: p.label,
        confidence: p.confidence,
        total_vehicles: p.total_vehicles,
        recommendations: recommendations(p.label),
    }))
}

#[instrument(skip(state, payload))]
pub async fn predict_energy(
    State(state): State<PublicState>,
    ApiJson(payload): ApiJson<EnergyRequest>,
) -> Result<Json<EnergyResponse>, ApiError> {
    if payload.features.is_empty() {
        return Err(ApiError::Unprocessable("features must not be empty".into()));
    }
    let prediction = state
        .models
        .predict_energy_load(&payload.features)
        .map_err(ApiError::validation)?;
    Ok(Json(EnergyResponse {
        prediction,
        unit: "kWh",
    }))
}

/// Scores each reading on its own; results keep the input order.
#[instrument(skip(state, readings), fields(count = readings.len()))]
pub async fn batch_air_quality(
    State(state): State<PublicState>,
    ApiJson(readings): ApiJson<Vec<AirQualityReading>>,
) -> Result<Json<BatchResponse>, ApiError> {
    if readings.len() > MAX_BATCH {
        return Err(ApiError::Unprocessable(format!(
            "batch of {} exceeds the limit of {MAX_BATCH}",
            readings.len()
        )));
    }
    let predictions = readings
        .iter()
        .enumerate()
        .map(|(i, reading)| {
            air_quality(&state, reading).map_err(|e| match e {
                ApiError::Unprocessable(msg) => ApiError::Unprocessable(format!("item {i}: {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(BatchResponse {
        count: predictions.len(),
        predictions,
    }))
}
