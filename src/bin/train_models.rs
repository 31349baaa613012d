use std::path::PathBuf;

use anyhow::Context;
use smartcity::{telemetry, training};

const SEED: u64 = 42;

/// `train_models [MODELS_DIR] [DATASETS_DIR]`; both fall back to the
/// environment, then to `models` and `datasets`.
fn dir_arg(position: usize, var: &str, default: &str) -> PathBuf {
    std::env::args()
        .nth(position)
        .or_else(|| std::env::var(var).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("smartcity=info,train_models=info");

    let models_dir = dir_arg(1, "MODELS_DIR", "models");
    let data_dir = dir_arg(2, "DATASETS_DIR", "datasets");
    tracing::info!(
        models_dir = %models_dir.display(),
        data_dir = %data_dir.display(),
        "training pipeline starting"
    );

    let reports =
        tokio::task::spawn_blocking(move || training::train_all(&models_dir, &data_dir, SEED))
            .await
            .context("training task panicked")??;

    for r in &reports {
        tracing::info!(
            model = %r.kind.as_str(),
            source = %r.source.describe(),
            train_samples = r.train_samples,
            test_samples = r.test_samples,
            trees = r.trees,
            max_depth = r.max_depth,
            training_score = r.training_score,
            test_score = r.test.map(|e| e.score),
            rmse = r.test.and_then(|e| e.rmse),
            "trained"
        );
    }
    tracing::info!(count = reports.len(), "all models trained");
    Ok(())
}
