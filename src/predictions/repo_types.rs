use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Kind of prediction stored in the history table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    Traffic,
    #[serde(alias = "air-quality")]
    AirQuality,
    Energy,
}

impl PredictionType {
    pub const ALL: [PredictionType; 3] = [
        PredictionType::Traffic,
        PredictionType::AirQuality,
        PredictionType::Energy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PredictionType::Traffic => "traffic",
            PredictionType::AirQuality => "air_quality",
            PredictionType::Energy => "energy",
        }
    }

    /// Accepts the stored name and the URL spelling `air-quality`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "traffic" => Some(PredictionType::Traffic),
            "air_quality" | "air-quality" => Some(PredictionType::AirQuality),
            "energy" => Some(PredictionType::Energy),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PredictionType::Traffic => "Traffic",
            PredictionType::AirQuality => "Air quality",
            PredictionType::Energy => "Energy",
        }
    }
}

/// Row of the `predictions` table.
#[derive(Debug, Clone, FromRow)]
pub struct Prediction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prediction_type: String,
    pub input_data: serde_json::Value,
    pub prediction_result: f64,
    pub confidence: Option<f64>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub user_id: Uuid,
    pub prediction_type: PredictionType,
    pub input_data: serde_json::Value,
    pub prediction_result: f64,
    pub confidence: Option<f64>,
}

/// Per-type counts for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct PredictionCounts {
    pub total: i64,
    pub traffic: i64,
    pub air_quality: i64,
    pub energy: i64,
}
