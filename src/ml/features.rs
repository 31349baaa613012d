//! Feature layouts and feature-vector marshaling.

use serde_json::{Map, Value};

use super::ModelError;

pub const TRAFFIC: [&str; 5] = ["hour", "day_of_week", "vehicle_count", "avg_speed", "weather"];

pub const AIR_QUALITY: [&str; 10] = [
    "feature_0", "feature_1", "feature_2", "feature_3", "feature_4",
    "feature_5", "feature_6", "feature_7", "feature_8", "feature_9",
];

pub const ENERGY: [&str; 5] = ["feature_0", "feature_1", "feature_2", "feature_3", "feature_4"];

pub const TRAFFIC_FLOW: [&str; 5] = ["car_count", "bike_count", "bus_count", "truck_count", "total"];

pub const AIR_SENSOR: [&str; 12] = [
    "PT08_S1_CO",
    "NMHC_GT",
    "C6H6_GT",
    "PT08_S2_NMHC",
    "NOx_GT",
    "PT08_S3_NOx",
    "NO2_GT",
    "PT08_S4_NO2",
    "PT08_S5_O3",
    "temperature",
    "humidity",
    "absolute_humidity",
];

pub const ENERGY_LOAD: [&str; 4] = ["temperature", "humidity", "hour", "load"];

// Three labels for a classifier that may be trained with more classes;
// out-of-table classes surface as ModelError::UnknownClass.
pub const TRAFFIC_LABELS: [&str; 3] = ["Low", "Medium", "High"];

pub const TRAFFIC_FLOW_LABELS: [&str; 4] = ["Low", "Medium", "High", "Very High"];

/// Names from `required` that are absent from `payload`, in layout order.
pub fn missing_keys<'a>(payload: &Map<String, Value>, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| !payload.contains_key(*name))
        .collect()
}

/// Builds the fixed-order feature vector for `names` out of a JSON object.
/// Absent or non-numeric keys are rejected.
pub fn vector_from_map(payload: &Map<String, Value>, names: &[&str]) -> Result<Vec<f64>, ModelError> {
    names
        .iter()
        .map(|name| {
            let value = payload
                .get(*name)
                .ok_or_else(|| ModelError::MissingFeature((*name).to_string()))?;
            value
                .as_f64()
                .ok_or_else(|| ModelError::InvalidFeature((*name).to_string()))
        })
        .collect()
}

pub fn ensure_finite(x: &[f64]) -> Result<(), ModelError> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ModelError::NonFinite)
    }
}
