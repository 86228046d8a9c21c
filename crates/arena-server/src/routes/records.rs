use axum::{extract::Query, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;

use crate::db;
use crate::error::AppError;

#[derive(Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<i64>,
}

/// GET /api/records?limit=20 — recent finished matches (denormalized
/// projection, rebuildable from games + moves).
pub async fn recent_records(
    Extension(pool): Extension<PgPool>,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let records = db::records::recent_records(&pool, limit).await?;
    Ok(Json(json!({ "records": records })))
}
