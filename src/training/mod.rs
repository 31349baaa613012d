//! Offline training: CSV or synthetic datasets, CART forests, and the job
//! that writes every model file the services load.

pub mod cart;
pub mod datasets;
pub mod loaders;

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::ml::{ModelKind, RandomForest, Task};

pub use cart::{evaluate, fit_forest, Evaluation, ForestParams, MaxFeatures, TreeParams};

/// Share of rows held out for the test score.
pub const TEST_FRACTION: f64 = 0.2;

/// Row-major training table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>, targets: Vec<f64>) -> Self {
        Self {
            feature_names,
            rows,
            targets,
        }
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn column_means(&self) -> Vec<f64> {
        let n = self.rows.len().max(1) as f64;
        let mut means = vec![0.0; self.n_features()];
        for row in &self.rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);
        means
    }

    /// Shuffles the rows with `seed` and cuts off `ceil(n * test_fraction)`
    /// of them as the test set, keeping at least one training row.
    /// Returns `(train, test)`.
    pub fn split(&self, test_fraction: f64, seed: u64) -> (Dataset, Dataset) {
        let n = self.rows.len();
        let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n.saturating_sub(1));
        let mut idx: Vec<usize> = (0..n).collect();
        idx.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test, train) = idx.split_at(n_test);
        (self.subset(train), self.subset(test))
    }

    fn subset(&self, idx: &[usize]) -> Dataset {
        Dataset::new(
            self.feature_names.clone(),
            idx.iter().map(|i| self.rows[*i].clone()).collect(),
            idx.iter().map(|i| self.targets[*i]).collect(),
        )
    }

    pub fn check(&self, task: Task) -> anyhow::Result<()> {
        anyhow::ensure!(!self.rows.is_empty(), "dataset is empty");
        anyhow::ensure!(
            self.rows.len() == self.targets.len(),
            "{} rows but {} targets",
            self.rows.len(),
            self.targets.len()
        );
        anyhow::ensure!(self.n_features() > 0, "dataset has no features");
        if let Some(i) = self.rows.iter().position(|r| r.len() != self.n_features()) {
            anyhow::bail!("row {i} has {} values, expected {}", self.rows[i].len(), self.n_features());
        }
        anyhow::ensure!(
            self.rows.iter().flatten().chain(&self.targets).all(|v| v.is_finite()),
            "dataset contains non-finite values"
        );
        if let Task::Classifier { n_classes } = task {
            if let Some(y) = self
                .targets
                .iter()
                .find(|y| y.fract() != 0.0 || **y < 0.0 || **y as usize >= n_classes)
            {
                anyhow::bail!("target {y} is not a class in 0..{n_classes}");
            }
        }
        Ok(())
    }
}

/// Where a model's rows came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Csv(Vec<PathBuf>),
    Synthetic,
}

impl Source {
    pub fn describe(&self) -> String {
        match self {
            Source::Csv(files) => files
                .iter()
                .map(|f| f.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            Source::Synthetic => "synthetic".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub kind: ModelKind,
    pub source: Source,
    pub train_samples: usize,
    pub test_samples: usize,
    pub trees: usize,
    pub max_depth: usize,
    pub training_score: f64,
    /// `None` when the table was too small to hold rows out.
    pub test: Option<Evaluation>,
}

/// Rows for `kind`: the CSV export under `data_dir` when one is usable,
/// otherwise the synthetic generator.
pub fn dataset(kind: ModelKind, data_dir: &Path, seed: u64) -> anyhow::Result<(Dataset, Source)> {
    if let Some(loaded) = loaders::load(kind, data_dir)? {
        if loaded.data.rows.len() >= 2 {
            return Ok((loaded.data, Source::Csv(loaded.files)));
        }
        warn!(model = %kind.as_str(), rows = loaded.data.rows.len(), "too few usable rows in dataset");
    }
    let plan = datasets::plan(kind);
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((datasets::generate(kind, plan.samples, &mut rng), Source::Synthetic))
}

/// Fits `kind` on the training split of its dataset and scores it on the
/// held-out rows.
pub fn train(kind: ModelKind, data_dir: &Path, seed: u64) -> anyhow::Result<(RandomForest, TrainingReport)> {
    let plan = datasets::plan(kind);
    let (data, source) = dataset(kind, data_dir, seed)?;
    let (train_set, test_set) = data.split(TEST_FRACTION, seed);
    let params = ForestParams {
        seed,
        ..plan.forest
    };
    let mut forest = fit_forest(kind.as_str(), plan.task, &train_set, &params)?;
    let test = if test_set.rows.is_empty() {
        None
    } else {
        Some(evaluate(&forest, &test_set)?)
    };
    forest.test_score = test.map(|e| e.score);

    let report = TrainingReport {
        kind,
        source,
        train_samples: train_set.rows.len(),
        test_samples: test_set.rows.len(),
        trees: forest.trees.len(),
        max_depth: forest.max_depth(),
        training_score: forest.training_score.unwrap_or_default(),
        test,
    };
    Ok((forest, report))
}

/// Trains every model from `data_dir` and writes it under `models_dir`.
pub fn train_all(models_dir: &Path, data_dir: &Path, seed: u64) -> anyhow::Result<Vec<TrainingReport>> {
    let mut reports = Vec::with_capacity(ModelKind::ALL.len());
    for (i, kind) in ModelKind::ALL.iter().enumerate() {
        info!(model = %kind.as_str(), step = i + 1, of = ModelKind::ALL.len(), "training");
        let (forest, report) = train(*kind, data_dir, seed)?;
        let path = models_dir.join(kind.file_name());
        forest.save(&path)?;
        info!(
            model = %kind.as_str(),
            source = %report.source.describe(),
            train_samples = report.train_samples,
            test_samples = report.test_samples,
            test_score = report.test.map(|e| e.score),
            rmse = report.test.and_then(|e| e.rmse),
            path = %path.display(),
            "model saved"
        );
        reports.push(report);
    }
    Ok(reports)
}
