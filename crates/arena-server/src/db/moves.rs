use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MoveRow {
    pub id: i64,
    pub game_id: i64,
    pub ply_index: i32,
    pub uci: String,
    pub fen_after: String,
    pub position_key_after: String,
    pub is_check: bool,
    pub created_at: DateTime<Utc>,
}

/// Append one half-move to the log. The UNIQUE(game_id, ply_index)
/// constraint rejects any attempt to write the same ply twice.
pub async fn append_move(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
    ply_index: i32,
    uci: &str,
    fen_after: &str,
    position_key_after: &str,
    is_check: bool,
) -> Result<MoveRow, AppError> {
    let row = sqlx::query_as::<_, MoveRow>(
        r#"INSERT INTO moves (game_id, ply_index, uci, fen_after, position_key_after, is_check)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *"#,
    )
    .bind(game_id)
    .bind(ply_index)
    .bind(uci)
    .bind(fen_after)
    .bind(position_key_after)
    .bind(is_check)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub async fn list_moves(pool: &PgPool, game_id: i64) -> Result<Vec<MoveRow>, AppError> {
    let moves = sqlx::query_as::<_, MoveRow>(
        "SELECT * FROM moves WHERE game_id = $1 ORDER BY ply_index",
    )
    .bind(game_id)
    .fetch_all(pool)
    .await?;
    Ok(moves)
}

/// Repetition keys of every recorded move in ply order. Threefold
/// detection needs the full history, not a recent window.
pub async fn key_history(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
) -> Result<Vec<String>, AppError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT position_key_after FROM moves WHERE game_id = $1 ORDER BY ply_index",
    )
    .bind(game_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(|(key,)| key).collect())
}
