use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::engines::EngineConfigRow;
use crate::db::games::GameRow;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MatchRecordRow {
    pub id: i64,
    pub game_id: i64,
    pub result: String,
    pub termination_reason: String,
    pub white_strength_mode: String,
    pub white_strength_value: i32,
    pub black_strength_mode: String,
    pub black_strength_value: i32,
    pub move_interval_ms: i32,
    pub ply_count: i32,
    pub finished_at: DateTime<Utc>,
}

/// Materialize the dashboard row for a finished game. Upsert: rebuilding
/// a record is always safe, the projection is not authoritative.
pub async fn upsert_record(
    tx: &mut Transaction<'_, Postgres>,
    game: &GameRow,
    white: &EngineConfigRow,
    black: &EngineConfigRow,
    result: &str,
    reason: &str,
    ply_count: i32,
    finished_at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO match_records (
            game_id, result, termination_reason,
            white_strength_mode, white_strength_value,
            black_strength_mode, black_strength_value,
            move_interval_ms, ply_count, finished_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (game_id) DO UPDATE SET
            result = EXCLUDED.result,
            termination_reason = EXCLUDED.termination_reason,
            ply_count = EXCLUDED.ply_count,
            finished_at = EXCLUDED.finished_at"#,
    )
    .bind(game.id)
    .bind(result)
    .bind(reason)
    .bind(&white.strength_mode)
    .bind(white.strength_value)
    .bind(&black.strength_mode)
    .bind(black.strength_value)
    .bind(game.move_interval_ms)
    .bind(ply_count)
    .bind(finished_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn recent_records(pool: &PgPool, limit: i64) -> Result<Vec<MatchRecordRow>, AppError> {
    let records = sqlx::query_as::<_, MatchRecordRow>(
        r#"SELECT id, game_id, result, termination_reason,
            white_strength_mode, white_strength_value,
            black_strength_mode, black_strength_value,
            move_interval_ms, ply_count, finished_at
        FROM match_records
        ORDER BY finished_at DESC
        LIMIT $1"#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(records)
}
