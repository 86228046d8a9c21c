use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use arena_core::{Side, StrengthMode};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EngineConfigRow {
    pub id: i64,
    pub game_id: i64,
    pub side: String,
    pub strength_mode: String,
    pub strength_value: i32,
    pub movetime_ms: i32,
    pub created_at: DateTime<Utc>,
}

impl EngineConfigRow {
    pub fn mode(&self) -> Option<StrengthMode> {
        StrengthMode::parse(&self.strength_mode)
    }
}

pub async fn insert_config(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
    side: Side,
    strength_mode: StrengthMode,
    strength_value: i32,
    movetime_ms: i32,
) -> Result<EngineConfigRow, AppError> {
    let cfg = sqlx::query_as::<_, EngineConfigRow>(
        r#"INSERT INTO engine_configs (game_id, side, strength_mode, strength_value, movetime_ms)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *"#,
    )
    .bind(game_id)
    .bind(side.as_str())
    .bind(strength_mode.as_str())
    .bind(strength_value)
    .bind(movetime_ms)
    .fetch_one(&mut **tx)
    .await?;
    Ok(cfg)
}

pub async fn get_configs(pool: &PgPool, game_id: i64) -> Result<Vec<EngineConfigRow>, AppError> {
    let configs = sqlx::query_as::<_, EngineConfigRow>(
        "SELECT * FROM engine_configs WHERE game_id = $1 ORDER BY side DESC",
    )
    .bind(game_id)
    .fetch_all(pool)
    .await?;
    Ok(configs)
}

/// Fetch one side's config inside the tick transaction.
pub async fn get_config_for_side(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
    side: Side,
) -> Result<EngineConfigRow, AppError> {
    sqlx::query_as::<_, EngineConfigRow>(
        "SELECT * FROM engine_configs WHERE game_id = $1 AND side = $2",
    )
    .bind(game_id)
    .bind(side.as_str())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| {
        AppError::Internal(format!(
            "game {game_id} has no engine config for {}",
            side.as_str()
        ))
    })
}
