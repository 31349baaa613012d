use std::fmt;

use serde::Serialize;

use super::features;

/// Every estimator the services know how to load.
///
/// The first three back the authenticated session API (named features); the
/// last three back the public API (positional / sensor features).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Traffic,
    AirQuality,
    Energy,
    TrafficFlow,
    AirSensor,
    EnergyLoad,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Traffic,
        ModelKind::AirQuality,
        ModelKind::Energy,
        ModelKind::TrafficFlow,
        ModelKind::AirSensor,
        ModelKind::EnergyLoad,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Traffic => "traffic",
            ModelKind::AirQuality => "air_quality",
            ModelKind::Energy => "energy",
            ModelKind::TrafficFlow => "traffic_flow",
            ModelKind::AirSensor => "air_sensor",
            ModelKind::EnergyLoad => "energy_load",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ModelKind::Traffic => "traffic_model.json",
            ModelKind::AirQuality => "air_quality_model.json",
            ModelKind::Energy => "energy_model.json",
            ModelKind::TrafficFlow => "traffic_random_forest.json",
            ModelKind::AirSensor => "air_quality_random_forest.json",
            ModelKind::EnergyLoad => "energy_random_forest.json",
        }
    }

    pub fn feature_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Traffic => &features::TRAFFIC,
            ModelKind::AirQuality => &features::AIR_QUALITY,
            ModelKind::Energy => &features::ENERGY,
            ModelKind::TrafficFlow => &features::TRAFFIC_FLOW,
            ModelKind::AirSensor => &features::AIR_SENSOR,
            ModelKind::EnergyLoad => &features::ENERGY_LOAD,
        }
    }

    pub fn n_features(self) -> usize {
        self.feature_names().len()
    }

    pub fn is_classifier(self) -> bool {
        matches!(self, ModelKind::Traffic | ModelKind::TrafficFlow)
    }

    /// Fixed label table for classifier kinds, indexed by class.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            ModelKind::Traffic => &features::TRAFFIC_LABELS,
            ModelKind::TrafficFlow => &features::TRAFFIC_FLOW_LABELS,
            _ => &[],
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            ModelKind::Traffic => "Traffic",
            ModelKind::AirQuality => "Air quality",
            ModelKind::Energy => "Energy",
            ModelKind::TrafficFlow => "Traffic flow",
            ModelKind::AirSensor => "Air sensor",
            ModelKind::EnergyLoad => "Energy load",
        };
        f.write_str(title)
    }
}
