use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewPrediction, Prediction, PredictionCounts, PredictionType};

const PREDICTION_COLUMNS: &str =
    "id, user_id, prediction_type, input_data, prediction_result, confidence, created_at";

pub async fn insert(db: &PgPool, new: &NewPrediction) -> anyhow::Result<Prediction> {
    let row = sqlx::query_as::<_, Prediction>(&format!(
        r#"
        INSERT INTO predictions (id, user_id, prediction_type, input_data, prediction_result, confidence)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {PREDICTION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.prediction_type.as_str())
    .bind(&new.input_data)
    .bind(new.prediction_result)
    .bind(new.confidence)
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Newest first. `kind = None` lists every type.
pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    kind: Option<PredictionType>,
    limit: Option<i64>,
    offset: i64,
) -> anyhow::Result<Vec<Prediction>> {
    let rows = sqlx::query_as::<_, Prediction>(&format!(
        r#"
        SELECT {PREDICTION_COLUMNS}
        FROM predictions
        WHERE user_id = $1 AND ($2::text IS NULL OR prediction_type = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(user_id)
    .bind(kind.map(PredictionType::as_str))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn counts_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<PredictionCounts> {
    let counts = sqlx::query_as::<_, PredictionCounts>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE prediction_type = 'traffic') AS traffic,
            COUNT(*) FILTER (WHERE prediction_type = 'air_quality') AS air_quality,
            COUNT(*) FILTER (WHERE prediction_type = 'energy') AS energy
        FROM predictions
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(counts)
}
