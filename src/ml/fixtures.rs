//! Hand-built forests for tests.

use super::{ModelKind, Node, RandomForest, Task, Tree};
use super::forest::FORMAT_VERSION;

fn one_hot(n_classes: usize, class: usize) -> Vec<f64> {
    let mut v = vec![0.0; n_classes];
    v[class] = 1.0;
    v
}

fn names(n_features: usize) -> Vec<String> {
    (0..n_features).map(|i| format!("feature_{i}")).collect()
}

/// Single-tree classifier splitting once on `feature`.
pub fn stump_classifier(
    name: &str,
    n_features: usize,
    feature: usize,
    threshold: f64,
    n_classes: usize,
    left_class: usize,
    right_class: usize,
) -> RandomForest {
    RandomForest {
        format_version: FORMAT_VERSION,
        name: name.to_string(),
        task: Task::Classifier { n_classes },
        n_features,
        feature_names: names(n_features),
        feature_means: vec![0.0; n_features],
        training_score: None,
        test_score: None,
        trained_at: None,
        trees: vec![Tree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf {
                    value: one_hot(n_classes, left_class),
                },
                Node::Leaf {
                    value: one_hot(n_classes, right_class),
                },
            ],
        }],
    }
}

/// Single-leaf regressor that always answers `value`.
pub fn constant_regressor(name: &str, n_features: usize, value: f64) -> RandomForest {
    RandomForest {
        format_version: FORMAT_VERSION,
        name: name.to_string(),
        task: Task::Regressor,
        n_features,
        feature_names: names(n_features),
        feature_means: vec![0.0; n_features],
        training_score: None,
        test_score: None,
        trained_at: None,
        trees: vec![Tree {
            nodes: vec![Node::Leaf { value: vec![value] }],
        }],
    }
}

/// Regressor splitting on the first feature: `low`
/// when `x[0] <= threshold`, `high` otherwise.
pub fn step_regressor(name: &str, n_features: usize, threshold: f64, low: f64, high: f64) -> RandomForest {
    let mut forest = constant_regressor(name, n_features, 0.0);
    forest.trees[0].nodes = vec![
        Node::Split {
            feature: 0,
            threshold,
            left: 1,
            right: 2,
        },
        Node::Leaf { value: vec![low] },
        Node::Leaf { value: vec![high] },
    ];
    forest
}

/// A loaded-looking model for `kind` with the right shape.
pub fn model_for(kind: ModelKind) -> RandomForest {
    let n = kind.n_features();
    let mut forest = match kind {
        // vehicle_count > 250 → High
        ModelKind::Traffic => stump_classifier(kind.as_str(), n, 2, 250.0, 3, 0, 2),
        // total > 400 → Very High
        ModelKind::TrafficFlow => stump_classifier(kind.as_str(), n, 4, 400.0, 4, 1, 3),
        ModelKind::AirQuality => constant_regressor(kind.as_str(), n, 250.0),
        ModelKind::Energy => constant_regressor(kind.as_str(), n, 120.5),
        ModelKind::AirSensor => step_regressor(kind.as_str(), n, 1500.0, 2.1, 6.4),
        ModelKind::EnergyLoad => step_regressor(kind.as_str(), n, 20.0, 80.0, 95.0),
    };
    forest.feature_names = kind.feature_names().iter().map(|s| s.to_string()).collect();
    if kind == ModelKind::EnergyLoad {
        forest.feature_means = vec![22.5, 60.0, 11.5, 125.0];
    }
    forest
}
