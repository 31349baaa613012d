//! Serialized estimators and the model manager that serves them.

pub mod features;
pub mod forest;
mod kind;
pub mod manager;

#[cfg(test)]
pub(crate) mod fixtures;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub use forest::{Node, RandomForest, Task, Tree};
pub use kind::ModelKind;
pub use manager::{
    AirQualityPrediction, EnergyPrediction, ModelManager, TrafficFlowPrediction,
    TrafficPrediction,
};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0} model not loaded")]
    NotLoaded(ModelKind),
    #[error("missing required feature: {0}")]
    MissingFeature(String),
    #[error("feature {0} must be a number")]
    InvalidFeature(String),
    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },
    #[error("feature values must be finite numbers")]
    NonFinite,
    #[error("model predicted class {class} but only {labels} labels are defined")]
    UnknownClass { class: usize, labels: usize },
    #[error("{name} is a {actual}, expected a {expected}")]
    TaskMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model: {0}")]
    Invalid(String),
}

impl ModelError {
    /// True when the caller supplied a bad feature vector, as opposed to the
    /// model being absent or broken.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ModelError::MissingFeature(_)
                | ModelError::InvalidFeature(_)
                | ModelError::FeatureCount { .. }
                | ModelError::NonFinite
        )
    }
}

/// Status-tagged result body: `{"status":"success", ...}` or
/// `{"status":"error","error":"..."}`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Success(T),
    Error { error: String },
}

impl<T> From<Result<T, ModelError>> for Outcome<T> {
    fn from(result: Result<T, ModelError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) => Outcome::Error {
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let result: Result<AirQualityPrediction, ModelError> =
            Ok(AirQualityPrediction { aqi: 42.5 });
        let ok = Outcome::from(result);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["aqi"], 42.5);

        let result: Result<AirQualityPrediction, ModelError> =
            Err(ModelError::NotLoaded(ModelKind::AirQuality));
        let err = Outcome::from(result);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "Air quality model not loaded");
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(ModelError::MissingFeature("hour".into()).is_input_error());
        assert!(ModelError::FeatureCount { expected: 5, got: 4 }.is_input_error());
        assert!(!ModelError::NotLoaded(ModelKind::Traffic).is_input_error());
        assert!(!ModelError::UnknownClass { class: 3, labels: 3 }.is_input_error());
    }
}
