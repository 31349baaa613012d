use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const MAX_BATCH: usize = 1000;
pub const CO_ALERT_THRESHOLD: f64 = 5.0;

/// One reading of the air-quality sensor station. Field names follow the
/// station's column names.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AirQualityReading {
    #[serde(rename = "PT08_S1_CO")]
    pub pt08_s1_co: f64,
    #[serde(rename = "NMHC_GT")]
    pub nmhc_gt: f64,
    #[serde(rename = "C6H6_GT")]
    pub c6h6_gt: f64,
    #[serde(rename = "PT08_S2_NMHC")]
    pub pt08_s2_nmhc: f64,
    #[serde(rename = "NOx_GT")]
    pub nox_gt: f64,
    #[serde(rename = "PT08_S3_NOx")]
    pub pt08_s3_nox: f64,
    #[serde(rename = "NO2_GT")]
    pub no2_gt: f64,
    #[serde(rename = "PT08_S4_NO2")]
    pub pt08_s4_no2: f64,
    #[serde(rename = "PT08_S5_O3")]
    pub pt08_s5_o3: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub absolute_humidity: f64,
}

impl AirQualityReading {
    /// Checks physical ranges and returns the readings in model order.
    pub fn validate(&self) -> Result<[f64; 12], ApiError> {
        let non_negative = [
            ("PT08_S1_CO", self.pt08_s1_co),
            ("NMHC_GT", self.nmhc_gt),
            ("C6H6_GT", self.c6h6_gt),
            ("PT08_S2_NMHC", self.pt08_s2_nmhc),
            ("NOx_GT", self.nox_gt),
            ("PT08_S3_NOx", self.pt08_s3_nox),
            ("NO2_GT", self.no2_gt),
            ("PT08_S4_NO2", self.pt08_s4_no2),
            ("PT08_S5_O3", self.pt08_s5_o3),
            ("humidity", self.humidity),
            ("absolute_humidity", self.absolute_humidity),
        ];
        if let Some((name, _)) = non_negative.iter().find(|(_, v)| *v < 0.0) {
            return Err(ApiError::Unprocessable(format!("{name} must be non-negative")));
        }
        if self.humidity > 100.0 {
            return Err(ApiError::Unprocessable("humidity must be at most 100".into()));
        }
        Ok([
            self.pt08_s1_co,
            self.nmhc_gt,
            self.c6h6_gt,
            self.pt08_s2_nmhc,
            self.nox_gt,
            self.pt08_s3_nox,
            self.no2_gt,
            self.pt08_s4_no2,
            self.pt08_s5_o3,
            self.temperature,
            self.humidity,
            self.absolute_humidity,
        ])
    }
}

#[derive(Debug, Serialize)]
pub struct AirQualityResponse {
    pub prediction: f64,
    pub unit: &'static str,
    pub alert: bool,
    pub message: &'static str,
}

impl AirQualityResponse {
    pub fn from_co(co: f64) -> Self {
        let alert = co > CO_ALERT_THRESHOLD;
        Self {
            prediction: co,
            unit: "mg/m³",
            alert,
            message: if alert {
                "High pollution alert! Immediate action recommended."
            } else {
                "Air quality is within acceptable limits."
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub predictions: Vec<AirQualityResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TrafficResponse {
    pub prediction: usize,
    pub traffic_level: &'static str,
    pub confidence: f64,
    pub total_vehicles: u64,
    pub recommendations: Vec<&'static str>,
}

/// Operator advice for a traffic level.
pub fn recommendations(level: &str) -> Vec<&'static str> {
    match level {
        "Low" => vec![
            "Traffic is flowing freely",
            "Keep the standard signal timing",
        ],
        "Medium" => vec![
            "Monitor the main intersections",
            "Consider adaptive signal timing",
        ],
        _ => vec![
            "Activate congestion control",
            "Reroute traffic to alternative roads",
            "Prioritise public transport lanes",
        ],
    }
}

#[derive(Debug, Deserialize)]
pub struct EnergyRequest {
    pub features: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct EnergyResponse {
    pub prediction: f64,
    pub unit: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RawCo {
    #[serde(rename = "Predicted_CO")]
    pub predicted_co: f64,
}

#[derive(Debug, Serialize)]
pub struct RawEnergy {
    #[serde(rename = "Predicted_Energy")]
    pub predicted_energy: f64,
}

#[derive(Debug, Serialize)]
pub struct RawTraffic {
    #[serde(rename = "Traffic_Level")]
    pub traffic_level: i64,
}
