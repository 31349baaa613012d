//! Synthetic training tables, one generator per model kind, and the
//! hyperparameters each model is fitted with.

use rand::rngs::StdRng;
use rand::Rng;

use crate::ml::{ModelKind, Task};

use super::{Dataset, ForestParams, MaxFeatures, TreeParams};

#[derive(Debug, Clone, Copy)]
pub struct Plan {
    pub task: Task,
    pub samples: usize,
    pub forest: ForestParams,
}

pub fn plan(kind: ModelKind) -> Plan {
    let small = TreeParams {
        max_depth: 10,
        min_samples_split: 2,
        min_samples_leaf: 1,
        max_features: MaxFeatures::All,
    };
    let (task, samples, n_estimators, tree) = match kind {
        ModelKind::Traffic => (
            Task::Classifier { n_classes: 3 },
            1000,
            50,
            TreeParams {
                max_features: MaxFeatures::Sqrt,
                ..small
            },
        ),
        ModelKind::AirQuality => (Task::Regressor, 500, 50, small),
        ModelKind::Energy => (Task::Regressor, 500, 50, small),
        ModelKind::TrafficFlow => (
            Task::Classifier { n_classes: 4 },
            2000,
            100,
            TreeParams {
                min_samples_split: 5,
                max_features: MaxFeatures::Sqrt,
                ..small
            },
        ),
        ModelKind::AirSensor | ModelKind::EnergyLoad => (
            Task::Regressor,
            1500,
            100,
            TreeParams {
                max_depth: 15,
                min_samples_split: 5,
                min_samples_leaf: 2,
                max_features: MaxFeatures::All,
            },
        ),
    };
    Plan {
        task,
        samples,
        forest: ForestParams {
            n_estimators,
            tree,
            seed: 42,
        },
    }
}

fn normal(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    // Box-Muller
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn int(rng: &mut StdRng, lo: i64, hi: i64) -> f64 {
    rng.gen_range(lo..hi) as f64
}

pub fn generate(kind: ModelKind, samples: usize, rng: &mut StdRng) -> Dataset {
    let (rows, targets) = match kind {
        ModelKind::Traffic => traffic(samples, rng),
        ModelKind::AirQuality => air_quality(samples, rng),
        ModelKind::Energy => energy(samples, rng),
        ModelKind::TrafficFlow => traffic_flow(samples, rng),
        ModelKind::AirSensor => air_sensor(samples, rng),
        ModelKind::EnergyLoad => energy_load(samples, rng),
    };
    let names = kind.feature_names().iter().map(|s| s.to_string()).collect();
    Dataset::new(names, rows, targets)
}

type Table = (Vec<Vec<f64>>, Vec<f64>);

/// hour, day_of_week, vehicle_count, avg_speed, weather → level 0..=2.
fn traffic(n: usize, rng: &mut StdRng) -> Table {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            vec![
                int(rng, 0, 24),
                int(rng, 0, 7),
                int(rng, 10, 500),
                rng.gen_range(10.0..80.0),
                int(rng, 0, 3),
            ]
        })
        .collect();
    let targets = rows
        .iter()
        .map(|r| {
            let level = 2 * u8::from(r[2] > 250.0) + u8::from(r[2] > 150.0) + u8::from(r[3] < 30.0);
            f64::from(level.min(2))
        })
        .collect();
    (rows, targets)
}

/// Ten generic sensor channels; AQI grows with their mean.
fn air_quality(n: usize, rng: &mut StdRng) -> Table {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..10).map(|_| rng.gen_range(0.0..100.0)).collect())
        .collect();
    let targets = rows
        .iter()
        .map(|r| r.iter().sum::<f64>() / 10.0 * 5.0 + normal(rng, 0.0, 5.0))
        .collect();
    (rows, targets)
}

/// temperature, humidity, hour, building load, usage factor → kWh.
fn energy(n: usize, rng: &mut StdRng) -> Table {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            vec![
                rng.gen_range(10.0..35.0),
                rng.gen_range(30.0..90.0),
                int(rng, 0, 24),
                rng.gen_range(50.0..200.0),
                rng.gen_range(0.0..1.0),
            ]
        })
        .collect();
    let targets = rows
        .iter()
        .map(|r| (r[0] * 0.5 + r[3] * 0.3 + r[4] * 50.0 + normal(rng, 0.0, 5.0)).clamp(0.0, 300.0))
        .collect();
    (rows, targets)
}

/// car, bike, bus, truck, total → four equal-width bins over the observed
/// total range.
fn traffic_flow(n: usize, rng: &mut StdRng) -> Table {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            let car = int(rng, 50, 300);
            let bike = int(rng, 10, 100);
            let bus = int(rng, 5, 30);
            let truck = int(rng, 2, 20);
            vec![car, bike, bus, truck, car + bike + bus + truck]
        })
        .collect();
    let totals: Vec<f64> = rows.iter().map(|r| r[4]).collect();
    let targets = equal_width_bins(&totals, 4);
    (rows, targets)
}

/// Bin index of each value when `[min, max]` is cut into `bins` intervals of
/// equal width. The maximum lands in the last bin.
pub fn equal_width_bins(values: &[f64], bins: usize) -> Vec<f64> {
    let (lo, hi) = values
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let width = ((hi - lo) / bins as f64).max(f64::EPSILON);
    let last = bins.saturating_sub(1) as f64;
    values
        .iter()
        .map(|v| ((v - lo) / width).floor().clamp(0.0, last))
        .collect()
}

/// Twelve readings in the ranges of a metal-oxide multisensor station;
/// target is the CO(GT) concentration in mg/m³.
fn air_sensor(n: usize, rng: &mut StdRng) -> Table {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            vec![
                rng.gen_range(650.0..2000.0),
                rng.gen_range(7.0..1200.0),
                rng.gen_range(0.2..60.0),
                rng.gen_range(380.0..2200.0),
                rng.gen_range(2.0..1500.0),
                rng.gen_range(320.0..2700.0),
                rng.gen_range(2.0..340.0),
                rng.gen_range(550.0..2800.0),
                rng.gen_range(220.0..2500.0),
                rng.gen_range(-2.0..45.0),
                rng.gen_range(9.0..89.0),
                rng.gen_range(0.18..2.2),
            ]
        })
        .collect();
    let targets = rows
        .iter()
        .map(|r| {
            let co = 0.1 + 0.0012 * (r[0] - 650.0) + 0.06 * r[2] + 0.0011 * r[4] + 0.002 * r[6];
            (co + normal(rng, 0.0, 0.2)).max(0.1)
        })
        .collect();
    (rows, targets)
}

/// temperature, humidity, hour, load → kWh of a blower station.
fn energy_load(n: usize, rng: &mut StdRng) -> Table {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            vec![
                rng.gen_range(10.0..35.0),
                rng.gen_range(30.0..90.0),
                int(rng, 0, 24),
                rng.gen_range(50.0..200.0),
            ]
        })
        .collect();
    let targets = rows
        .iter()
        .map(|r| (0.5 * r[0] + 0.1 * r[1] + 0.3 * r[3] + normal(rng, 0.0, 3.0)).clamp(0.0, 300.0))
        .collect();
    (rows, targets)
}
