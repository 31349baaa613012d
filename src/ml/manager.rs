use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::features::vector_from_map;
use super::{ModelError, ModelKind, RandomForest, Task};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficPrediction {
    pub prediction: usize,
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualityPrediction {
    pub aqi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyPrediction {
    pub consumption_kwh: f64,
}

/// Vehicle counts observed at a junction over one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleCounts {
    pub car_count: u32,
    pub bike_count: u32,
    pub bus_count: u32,
    pub truck_count: u32,
}

impl VehicleCounts {
    pub fn total(&self) -> u64 {
        [self.car_count, self.bike_count, self.bus_count, self.truck_count]
            .iter()
            .map(|c| u64::from(*c))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficFlowPrediction {
    pub class: usize,
    pub label: &'static str,
    pub confidence: f64,
    pub total_vehicles: u64,
}

/// Owns every estimator that loaded successfully. Read-only after
/// construction; shared between requests behind an `Arc`.
#[derive(Debug, Default)]
pub struct ModelManager {
    models: HashMap<ModelKind, RandomForest>,
}

impl ModelManager {
    /// Loads every known model file from `dir`. A missing or broken file
    /// disables only that model.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut manager = Self::default();
        for kind in ModelKind::ALL {
            let path = dir.join(kind.file_name());
            if !path.exists() {
                warn!(model = %kind.as_str(), path = %path.display(), "model file not found");
                continue;
            }
            match RandomForest::load(&path) {
                Ok(forest) => manager.install(kind, forest),
                Err(e) => error!(model = %kind.as_str(), error = %e, "failed to load model"),
            }
        }
        manager
    }

    /// Builds a manager from in-memory forests. Each one goes through the
    /// same checks as a file on disk; rejected forests are left unloaded.
    pub fn from_models(models: impl IntoIterator<Item = (ModelKind, RandomForest)>) -> Self {
        let mut manager = Self::default();
        for (kind, forest) in models {
            manager.install(kind, forest);
        }
        manager
    }

    fn install(&mut self, kind: ModelKind, forest: RandomForest) {
        match forest.validate().and_then(|()| check_shape(kind, forest)) {
            Ok(forest) => {
                info!(
                    model = %kind.as_str(),
                    trees = forest.trees.len(),
                    features = forest.n_features,
                    max_depth = forest.max_depth(),
                    "model loaded"
                );
                self.models.insert(kind, forest);
            }
            Err(e) => error!(model = %kind.as_str(), error = %e, "rejected model"),
        }
    }

    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }

    pub fn status(&self) -> BTreeMap<ModelKind, bool> {
        ModelKind::ALL
            .iter()
            .map(|kind| (*kind, self.is_loaded(*kind)))
            .collect()
    }

    fn model(&self, kind: ModelKind) -> Result<&RandomForest, ModelError> {
        self.models.get(&kind).ok_or(ModelError::NotLoaded(kind))
    }

    fn label(kind: ModelKind, class: usize) -> Result<&'static str, ModelError> {
        let labels = kind.labels();
        labels.get(class).copied().ok_or(ModelError::UnknownClass {
            class,
            labels: labels.len(),
        })
    }

    pub fn predict_traffic(&self, features: &Map<String, Value>) -> Result<TrafficPrediction, ModelError> {
        let model = self.model(ModelKind::Traffic)?;
        let x = vector_from_map(features, ModelKind::Traffic.feature_names())?;
        let c = model.classify(&x)?;
        let label = Self::label(ModelKind::Traffic, c.class)?;
        debug!(class = c.class, confidence = c.confidence, "traffic prediction");
        Ok(TrafficPrediction {
            prediction: c.class,
            label: label.to_string(),
            confidence: c.confidence,
        })
    }

    pub fn predict_air_quality(&self, features: &Map<String, Value>) -> Result<AirQualityPrediction, ModelError> {
        let model = self.model(ModelKind::AirQuality)?;
        let x = vector_from_map(features, ModelKind::AirQuality.feature_names())?;
        Ok(AirQualityPrediction {
            aqi: model.regress(&x)?,
        })
    }

    pub fn predict_energy(&self, features: &Map<String, Value>) -> Result<EnergyPrediction, ModelError> {
        let model = self.model(ModelKind::Energy)?;
        let x = vector_from_map(features, ModelKind::Energy.feature_names())?;
        Ok(EnergyPrediction {
            consumption_kwh: model.regress(&x)?,
        })
    }

    pub fn predict_traffic_flow(&self, counts: &VehicleCounts) -> Result<TrafficFlowPrediction, ModelError> {
        let model = self.model(ModelKind::TrafficFlow)?;
        let total = counts.total();
        let x = [
            f64::from(counts.car_count),
            f64::from(counts.bike_count),
            f64::from(counts.bus_count),
            f64::from(counts.truck_count),
            total as f64,
        ];
        let c = model.classify(&x)?;
        Ok(TrafficFlowPrediction {
            class: c.class,
            label: Self::label(ModelKind::TrafficFlow, c.class)?,
            confidence: c.confidence,
            total_vehicles: total,
        })
    }

    /// CO(GT) concentration from the twelve sensor readings, in layout order.
    pub fn predict_co_level(&self, readings: &[f64; 12]) -> Result<f64, ModelError> {
        self.model(ModelKind::AirSensor)?.regress(readings)
    }

    /// Accepts between one and `n_features` leading features; the rest are
    /// filled from the training means stored with the model.
    pub fn predict_energy_load(&self, features: &[f64]) -> Result<f64, ModelError> {
        let model = self.model(ModelKind::EnergyLoad)?;
        if features.is_empty() || features.len() > model.n_features {
            return Err(ModelError::FeatureCount {
                expected: model.n_features,
                got: features.len(),
            });
        }
        let mut x = features.to_vec();
        x.extend_from_slice(&model.feature_means[features.len()..]);
        model.regress(&x)
    }

    /// Positional call straight into the estimator; the vector must have
    /// exactly the model's feature count.
    pub fn predict_raw(&self, kind: ModelKind, x: &[f64]) -> Result<f64, ModelError> {
        self.model(kind)?.predict(x)
    }
}

fn check_shape(kind: ModelKind, forest: RandomForest) -> Result<RandomForest, ModelError> {
    if forest.n_features != kind.n_features() {
        return Err(ModelError::Invalid(format!(
            "{} expects {} features, file declares {}",
            kind.as_str(),
            kind.n_features(),
            forest.n_features
        )));
    }
    match (kind.is_classifier(), forest.task) {
        (true, Task::Classifier { n_classes }) => {
            if n_classes > kind.labels().len() {
                warn!(
                    model = %kind.as_str(),
                    n_classes,
                    labels = kind.labels().len(),
                    "classifier has more classes than labels; unlabelled classes will be reported as errors"
                );
            }
            Ok(forest)
        }
        (false, Task::Regressor) => Ok(forest),
        (expects_classifier, task) => Err(ModelError::TaskMismatch {
            name: forest.name.clone(),
            expected: if expects_classifier { "classifier" } else { "regressor" },
            actual: task.describe(),
        }),
    }
}
