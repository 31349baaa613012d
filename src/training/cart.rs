//! CART trees and bootstrap-aggregated forests.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use time::OffsetDateTime;

use crate::ml::forest::FORMAT_VERSION;
use crate::ml::{Node, RandomForest, Task, Tree};

use super::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn count(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub tree: TreeParams,
    pub seed: u64,
}

struct Builder<'a> {
    data: &'a Dataset,
    task: Task,
    params: TreeParams,
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl<'a> Builder<'a> {
    fn leaf_value(&self, idx: &[usize]) -> Vec<f64> {
        match self.task {
            Task::Classifier { n_classes } => {
                let mut counts = vec![0.0; n_classes];
                for &i in idx {
                    counts[self.data.targets[i] as usize] += 1.0;
                }
                let n = idx.len() as f64;
                counts.iter_mut().for_each(|c| *c /= n);
                counts
            }
            Task::Regressor => {
                let sum: f64 = idx.iter().map(|&i| self.data.targets[i]).sum();
                vec![sum / idx.len() as f64]
            }
        }
    }

    fn is_pure(&self, idx: &[usize]) -> bool {
        let first = self.data.targets[idx[0]];
        idx.iter().all(|&i| self.data.targets[i] == first)
    }

    /// Appends the subtree for `idx` and returns its root index. Children are
    /// pushed after their parent.
    fn grow(&mut self, idx: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let at = self.nodes.len();
        let value = self.leaf_value(&idx);
        self.nodes.push(Node::Leaf { value });

        if depth >= self.params.max_depth
            || idx.len() < self.params.min_samples_split
            || self.is_pure(&idx)
        {
            return at;
        }

        let Some(split) = self.best_split(&idx, rng) else {
            return at;
        };
        let left = self.grow(split.left, depth + 1, rng);
        let right = self.grow(split.right, depth + 1, rng);
        self.nodes[at] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        at
    }

    fn best_split(&self, idx: &[usize], rng: &mut StdRng) -> Option<Split> {
        let n_features = self.data.n_features();
        let k = self.params.max_features.count(n_features);
        let candidates = sample(rng, n_features, k);

        let mut best: Option<(f64, usize, f64)> = None;
        let mut order = idx.to_vec();
        for feature in candidates.iter() {
            order.sort_by(|a, b| {
                self.data.rows[*a][feature].total_cmp(&self.data.rows[*b][feature])
            });
            if let Some((cost, threshold)) = self.scan(&order, feature) {
                if best.map_or(true, |(c, _, _)| cost < c) {
                    best = Some((cost, feature, threshold));
                }
            }
        }

        let (_, feature, threshold) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = idx
            .iter()
            .partition(|&&i| self.data.rows[i][feature] <= threshold);
        Some(Split {
            feature,
            threshold,
            left,
            right,
        })
    }

    /// Sweeps split points over `order` (sorted by `feature`) and returns the
    /// lowest weighted impurity with its threshold.
    fn scan(&self, order: &[usize], feature: usize) -> Option<(f64, f64)> {
        let n = order.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let value = |pos: usize| self.data.rows[order[pos]][feature];
        let target = |pos: usize| self.data.targets[order[pos]];

        let mut best: Option<(f64, f64)> = None;
        let consider = |pos: usize, cost: f64, best: &mut Option<(f64, f64)>| {
            let (lo, hi) = (value(pos), value(pos + 1));
            if lo >= hi || pos + 1 < min_leaf || n - pos - 1 < min_leaf {
                return;
            }
            let mut threshold = lo + (hi - lo) / 2.0;
            if threshold >= hi {
                threshold = lo;
            }
            if best.map_or(true, |(c, _)| cost < c) {
                *best = Some((cost, threshold));
            }
        };

        match self.task {
            Task::Classifier { n_classes } => {
                let mut left = vec![0usize; n_classes];
                let mut right = vec![0usize; n_classes];
                for pos in 0..n {
                    right[target(pos) as usize] += 1;
                }
                for pos in 0..n - 1 {
                    let class = target(pos) as usize;
                    left[class] += 1;
                    right[class] -= 1;
                    let nl = pos + 1;
                    let nr = n - nl;
                    let cost = gini(&left, nl) * nl as f64 + gini(&right, nr) * nr as f64;
                    consider(pos, cost, &mut best);
                }
            }
            Task::Regressor => {
                let (mut sum_r, mut sq_r) = (0.0, 0.0);
                for pos in 0..n {
                    sum_r += target(pos);
                    sq_r += target(pos) * target(pos);
                }
                let (mut sum_l, mut sq_l) = (0.0, 0.0);
                for pos in 0..n - 1 {
                    let y = target(pos);
                    sum_l += y;
                    sq_l += y * y;
                    sum_r -= y;
                    sq_r -= y * y;
                    let nl = (pos + 1) as f64;
                    let nr = (n - pos - 1) as f64;
                    let cost = (sq_l - sum_l * sum_l / nl) + (sq_r - sum_r * sum_r / nr);
                    consider(pos, cost, &mut best);
                }
            }
        }
        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

pub fn fit_tree(data: &Dataset, task: Task, params: TreeParams, sample_idx: Vec<usize>, rng: &mut StdRng) -> Tree {
    let mut builder = Builder {
        data,
        task,
        params,
        nodes: Vec::new(),
    };
    builder.grow(sample_idx, 0, rng);
    Tree {
        nodes: builder.nodes,
    }
}

/// Fits `n_estimators` trees, each on a bootstrap sample of the rows.
pub fn fit_forest(name: &str, task: Task, data: &Dataset, params: &ForestParams) -> anyhow::Result<RandomForest> {
    data.check(task)?;
    anyhow::ensure!(params.n_estimators > 0, "n_estimators must be positive");

    let mut rng = StdRng::seed_from_u64(params.seed);
    let n = data.rows.len();
    let trees = (0..params.n_estimators)
        .map(|_| {
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            fit_tree(data, task, params.tree, bootstrap, &mut rng)
        })
        .collect();

    let mut forest = RandomForest {
        format_version: FORMAT_VERSION,
        name: name.to_string(),
        task,
        n_features: data.n_features(),
        feature_names: data.feature_names.clone(),
        feature_means: data.column_means(),
        training_score: None,
        test_score: None,
        trained_at: Some(OffsetDateTime::now_utc()),
        trees,
    };
    forest.training_score = Some(score(&forest, data)?);
    forest.validate()?;
    Ok(forest)
}

/// Accuracy for classifiers, R² for regressors, over `data`.
pub fn score(forest: &RandomForest, data: &Dataset) -> anyhow::Result<f64> {
    let n = data.rows.len() as f64;
    match forest.task {
        Task::Classifier { .. } => {
            let mut hits = 0usize;
            for (row, y) in data.rows.iter().zip(&data.targets) {
                if forest.classify(row)?.class == *y as usize {
                    hits += 1;
                }
            }
            Ok(hits as f64 / n)
        }
        Task::Regressor => {
            let mean = data.targets.iter().sum::<f64>() / n;
            let mut ss_res = 0.0;
            let mut ss_tot = 0.0;
            for (row, y) in data.rows.iter().zip(&data.targets) {
                let p = forest.regress(row)?;
                ss_res += (y - p) * (y - p);
                ss_tot += (y - mean) * (y - mean);
            }
            Ok(if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot })
        }
    }
}

/// Held-out metrics of a fitted forest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Accuracy or R², as in [`score`].
    pub score: f64,
    /// Root mean squared error; regressors only.
    pub rmse: Option<f64>,
}

pub fn evaluate(forest: &RandomForest, data: &Dataset) -> anyhow::Result<Evaluation> {
    anyhow::ensure!(!data.rows.is_empty(), "nothing to evaluate on");
    let rmse = match forest.task {
        Task::Classifier { .. } => None,
        Task::Regressor => {
            let mut se = 0.0;
            for (row, y) in data.rows.iter().zip(&data.targets) {
                let p = forest.regress(row)?;
                se += (y - p) * (y - p);
            }
            Some((se / data.rows.len() as f64).sqrt())
        }
    };
    Ok(Evaluation {
        score: score(forest, data)?,
        rmse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_estimators: usize, max_features: MaxFeatures) -> ForestParams {
        ForestParams {
            n_estimators,
            tree: TreeParams {
                max_depth: 6,
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features,
            },
            seed: 7,
        }
    }

    fn threshold_data() -> Dataset {
        // class is 1 exactly when x0 > 5, x1 is noise
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 10) as f64, (i * 7 % 3) as f64]).collect();
        let targets = rows.iter().map(|r| if r[0] > 5.0 { 1.0 } else { 0.0 }).collect();
        Dataset::new(vec!["x0".into(), "x1".into()], rows, targets)
    }

    #[test]
    fn gini_of_pure_and_even_sets() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[0, 0], 0), 0.0);
    }

    #[test]
    fn single_tree_learns_a_threshold() {
        let data = threshold_data();
        let mut rng = StdRng::seed_from_u64(1);
        let tree_params = params(1, MaxFeatures::All).tree;
        let tree = fit_tree(&data, Task::Classifier { n_classes: 2 }, tree_params, (0..40).collect(), &mut rng);
        match &tree.nodes[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 5.5);
            }
            other => panic!("expected a split at the root, got {other:?}"),
        }
    }

    #[test]
    fn classifier_forest_fits_training_data() {
        let data = threshold_data();
        let forest = fit_forest("t", Task::Classifier { n_classes: 2 }, &data, &params(15, MaxFeatures::Sqrt)).unwrap();
        assert_eq!(forest.trees.len(), 15);
        assert!(forest.training_score.unwrap() > 0.9);
        assert_eq!(forest.classify(&[9.0, 0.0]).unwrap().class, 1);
        assert_eq!(forest.classify(&[1.0, 0.0]).unwrap().class, 0);
    }

    #[test]
    fn regressor_forest_tracks_a_linear_target() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64]).collect();
        let targets = rows.iter().map(|r| 3.0 * r[0] + 1.0).collect();
        let data = Dataset::new(vec!["x".into()], rows, targets);
        let forest = fit_forest("r", Task::Regressor, &data, &params(10, MaxFeatures::All)).unwrap();
        assert!(forest.training_score.unwrap() > 0.95);
        let p = forest.regress(&[30.0]).unwrap();
        assert!((p - 91.0).abs() < 15.0, "prediction {p}");
    }

    #[test]
    fn same_seed_gives_same_forest() {
        let data = threshold_data();
        let a = fit_forest("t", Task::Classifier { n_classes: 2 }, &data, &params(5, MaxFeatures::Sqrt)).unwrap();
        let b = fit_forest("t", Task::Classifier { n_classes: 2 }, &data, &params(5, MaxFeatures::Sqrt)).unwrap();
        assert_eq!(a.trees, b.trees);
    }

    #[test]
    fn max_depth_is_respected() {
        let data = threshold_data();
        let mut p = params(3, MaxFeatures::All);
        p.tree.max_depth = 1;
        let forest = fit_forest("t", Task::Classifier { n_classes: 2 }, &data, &p).unwrap();
        assert!(forest.trees.iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn min_samples_leaf_blocks_tiny_leaves() {
        let data = threshold_data();
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree_params = params(1, MaxFeatures::All).tree;
        tree_params.min_samples_leaf = 25;
        // 40 rows cannot be split into two leaves of at least 25
        let tree = fit_tree(&data, Task::Classifier { n_classes: 2 }, tree_params, (0..40).collect(), &mut rng);
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn evaluation_reports_rmse_for_regressors_only() {
        let data = Dataset::new(vec!["x".into()], vec![vec![0.0], vec![1.0]], vec![1.0, 3.0]);
        let constant = crate::ml::fixtures::constant_regressor("r", 1, 2.0);
        let eval = evaluate(&constant, &data).unwrap();
        assert_eq!(eval.rmse, Some(1.0));
        assert_eq!(eval.score, 0.0);

        let data = threshold_data();
        let forest = fit_forest("t", Task::Classifier { n_classes: 2 }, &data, &params(5, MaxFeatures::All)).unwrap();
        let eval = evaluate(&forest, &data).unwrap();
        assert_eq!(eval.rmse, None);
        assert_eq!(Some(eval.score), forest.training_score);

        let empty = Dataset::new(vec!["x0".into(), "x1".into()], vec![], vec![]);
        assert!(evaluate(&forest, &empty).is_err());
    }
}
