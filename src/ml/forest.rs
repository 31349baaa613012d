//! Random forest estimator: the on-disk JSON format and inference.
//!
//! Each tree is a flat node array. Children always sit after their parent,
//! which `validate` enforces, so walking a loaded tree cannot loop or index
//! out of bounds.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::ModelError;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    Classifier { n_classes: usize },
    Regressor,
}

impl Task {
    /// Width of a leaf value: class distribution or a single mean.
    pub fn output_width(&self) -> usize {
        match self {
            Task::Classifier { n_classes } => *n_classes,
            Task::Regressor => 1,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Task::Classifier { .. } => "classifier",
            Task::Regressor => "regressor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Go `left` when `x[feature] <= threshold`, otherwise `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[*feature] <= *threshold { *left } else { *right },
                Node::Leaf { value } => return value,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    fn validate(&self, n_features: usize, width: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        let n = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {idx}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx}: threshold is not finite"));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= n {
                            return Err(format!("node {idx}: child {child} out of order"));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != width {
                        return Err(format!(
                            "node {idx}: leaf has {} outputs, expected {width}",
                            value.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Result of a classifier call: first argmax class and its mean probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class: usize,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub format_version: u32,
    pub name: String,
    pub task: Task,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    /// Column means of the training data.
    pub feature_means: Vec<f64>,
    #[serde(default)]
    pub training_score: Option<f64>,
    /// Same metric on rows held out from fitting.
    #[serde(default)]
    pub test_score: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub trained_at: Option<OffsetDateTime>,
    pub trees: Vec<Tree>,
}

impl RandomForest {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let forest: RandomForest = serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        forest.validate()?;
        Ok(forest)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create models dir {}", parent.display()))?;
        }
        let json = serde_json::to_string(self).context("serialize forest")?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Deepest tree in the ensemble; 0 for a forest of single leaves.
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ModelError::Invalid(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        if self.n_features == 0 {
            return Err(ModelError::Invalid("model expects zero features".into()));
        }
        if self.feature_names.len() != self.n_features || self.feature_means.len() != self.n_features {
            return Err(ModelError::Invalid(
                "feature names and means must match n_features".into(),
            ));
        }
        if let Task::Classifier { n_classes } = self.task {
            if n_classes < 2 {
                return Err(ModelError::Invalid("classifier needs at least two classes".into()));
            }
        }
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".into()));
        }
        let width = self.task.output_width();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, width)
                .map_err(|msg| ModelError::Invalid(format!("tree {i}: {msg}")))?;
        }
        Ok(())
    }

    fn check_input(&self, x: &[f64]) -> Result<(), ModelError> {
        if x.len() != self.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                got: x.len(),
            });
        }
        super::features::ensure_finite(x)
    }

    /// Mean leaf value across trees.
    fn average(&self, x: &[f64]) -> Vec<f64> {
        let width = self.task.output_width();
        let mut acc = vec![0.0; width];
        for tree in &self.trees {
            for (a, v) in acc.iter_mut().zip(tree.leaf_value(x)) {
                *a += v;
            }
        }
        let n = self.trees.len() as f64;
        acc.iter_mut().for_each(|a| *a /= n);
        acc
    }

    fn mismatch(&self, expected: &'static str) -> ModelError {
        ModelError::TaskMismatch {
            name: self.name.clone(),
            expected,
            actual: self.task.describe(),
        }
    }

    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        if !matches!(self.task, Task::Classifier { .. }) {
            return Err(self.mismatch("classifier"));
        }
        self.check_input(x)?;
        Ok(self.average(x))
    }

    pub fn classify(&self, x: &[f64]) -> Result<Classification, ModelError> {
        let probabilities = self.predict_proba(x)?;
        let mut class = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[class] {
                class = i;
            }
        }
        Ok(Classification {
            class,
            confidence: probabilities[class],
            probabilities,
        })
    }

    pub fn regress(&self, x: &[f64]) -> Result<f64, ModelError> {
        if self.task != Task::Regressor {
            return Err(self.mismatch("regressor"));
        }
        self.check_input(x)?;
        Ok(self.average(x)[0])
    }

    /// Task-agnostic predict: the regression value, or the class index.
    pub fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        match self.task {
            Task::Regressor => self.regress(x),
            Task::Classifier { .. } => self.classify(x).map(|c| c.class as f64),
        }
    }
}
