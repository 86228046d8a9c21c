use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use arena_core::{GameStatus, TerminationReason, STARTPOS_FEN};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GameRow {
    pub id: i64,
    pub status: String,
    pub fen: String,
    pub ply_count: i32,
    pub move_interval_ms: i32,
    pub next_action_at: Option<DateTime<Utc>>,
    pub last_move_uci: String,
    pub result: String,
    pub termination_reason: String,
    pub initial_position_key: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameRow {
    pub fn status(&self) -> Option<GameStatus> {
        GameStatus::parse(&self.status)
    }

    /// A tick acts only on a running game whose scheduled time has come.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status() == Some(GameStatus::Running)
            && self.next_action_at.map_or(true, |at| now >= at)
    }
}

pub async fn create_game(
    tx: &mut Transaction<'_, Postgres>,
    move_interval_ms: i32,
) -> Result<GameRow, AppError> {
    let game = sqlx::query_as::<_, GameRow>(
        "INSERT INTO games (status, fen, move_interval_ms) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(GameStatus::Configured.as_str())
    .bind(STARTPOS_FEN)
    .bind(move_interval_ms)
    .fetch_one(&mut **tx)
    .await?;
    Ok(game)
}

pub async fn get_game(pool: &PgPool, game_id: i64) -> Result<GameRow, AppError> {
    sqlx::query_as::<_, GameRow>("SELECT * FROM games WHERE id = $1")
        .bind(game_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game {game_id} not found")))
}

/// Read the game row under a blocking row-level lock. Concurrent tickers
/// for the same game serialize here instead of racing the
/// read-modify-write; this lock, not the in-process advisory one, is the
/// correctness guarantee.
pub async fn get_game_for_update(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
) -> Result<GameRow, AppError> {
    sqlx::query_as::<_, GameRow>("SELECT * FROM games WHERE id = $1 FOR UPDATE")
        .bind(game_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game {game_id} not found")))
}

pub async fn set_initial_position_key(
    pool: &PgPool,
    game_id: i64,
    key: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE games SET initial_position_key = $2, updated_at = NOW() WHERE id = $1")
        .bind(game_id)
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// CONFIGURED/PAUSED -> RUNNING. Scheduling starts (or resumes)
/// immediately.
pub async fn mark_started(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
    now: DateTime<Utc>,
) -> Result<GameRow, AppError> {
    let game = sqlx::query_as::<_, GameRow>(
        r#"UPDATE games SET
            status = $2,
            started_at = COALESCE(started_at, $3),
            next_action_at = $3,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *"#,
    )
    .bind(game_id)
    .bind(GameStatus::Running.as_str())
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;
    Ok(game)
}

pub async fn mark_paused(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
) -> Result<GameRow, AppError> {
    let game = sqlx::query_as::<_, GameRow>(
        "UPDATE games SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(game_id)
    .bind(GameStatus::Paused.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Ok(game)
}

/// Record an applied half-move on the game row and reschedule the next
/// tick. Must be called in the same transaction as the move insert.
pub async fn apply_move(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
    fen: &str,
    ply_count: i32,
    last_move_uci: &str,
    move_interval_ms: i32,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let next_action_at = now + Duration::milliseconds(move_interval_ms as i64);
    sqlx::query(
        r#"UPDATE games SET
            fen = $2,
            ply_count = $3,
            last_move_uci = $4,
            next_action_at = $5,
            updated_at = NOW()
        WHERE id = $1"#,
    )
    .bind(game_id)
    .bind(fen)
    .bind(ply_count)
    .bind(last_move_uci)
    .bind(next_action_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Terminal transition. Result is "1-0", "0-1" or "1/2-1/2".
pub async fn mark_finished(
    tx: &mut Transaction<'_, Postgres>,
    game_id: i64,
    result: &str,
    reason: TerminationReason,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"UPDATE games SET
            status = $2,
            result = $3,
            termination_reason = $4,
            finished_at = $5,
            updated_at = NOW()
        WHERE id = $1"#,
    )
    .bind(game_id)
    .bind(GameStatus::Finished.as_str())
    .bind(result)
    .bind(reason.as_str())
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(status: &str, next_action_at: Option<DateTime<Utc>>) -> GameRow {
        GameRow {
            id: 1,
            status: status.to_string(),
            fen: STARTPOS_FEN.to_string(),
            ply_count: 0,
            move_interval_ms: 500,
            next_action_at,
            last_move_uci: String::new(),
            result: String::new(),
            termination_reason: String::new(),
            initial_position_key: String::new(),
            started_at: None,
            finished_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        assert!(game("RUNNING", Some(now - Duration::seconds(1))).is_due(now));
        assert!(game("RUNNING", Some(now)).is_due(now));
        assert!(game("RUNNING", None).is_due(now));
        assert!(!game("RUNNING", Some(now + Duration::seconds(1))).is_due(now));
        // Non-running games are never due, whatever the schedule says.
        assert!(!game("PAUSED", Some(now - Duration::seconds(1))).is_due(now));
        assert!(!game("FINISHED", None).is_due(now));
        assert!(!game("CONFIGURED", None).is_due(now));
    }
}
