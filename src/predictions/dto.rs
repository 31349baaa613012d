use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Prediction;

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    pub result: f64,
    pub confidence: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Prediction> for HistoryItem {
    fn from(p: Prediction) -> Self {
        Self {
            id: p.id,
            result: p.prediction_result,
            confidence: p.confidence,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<HistoryItem>,
}

/// Entry of the cross-type listing; carries the type and the stored input.
#[derive(Debug, Serialize)]
pub struct PredictionItem {
    pub id: Uuid,
    pub prediction_type: String,
    pub input_data: serde_json::Value,
    pub result: f64,
    pub confidence: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Prediction> for PredictionItem {
    fn from(p: Prediction) -> Self {
        Self {
            id: p.id,
            prediction_type: p.prediction_type,
            input_data: p.input_data,
            result: p.prediction_result,
            confidence: p.confidence,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub data: Vec<PredictionItem>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

pub const MAX_PAGE: i64 = 100;
