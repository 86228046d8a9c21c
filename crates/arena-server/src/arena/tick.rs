//! The tick orchestrator: advance one game by at most one half-move.
//!
//! A tick is a best-effort probe, safe to call repeatedly and
//! concurrently. It holds the per-game advisory lock for its whole
//! duration and does all row reads/writes inside one transaction opened
//! with `SELECT ... FOR UPDATE`, so either the whole ply commits or
//! nothing does. Engine failures abort before commit and leave the game
//! row byte-for-byte unchanged; the next tick retries naturally.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

use arena_core::{evaluate, EvalInput, GameStatus, Outcome, Side, TerminationReason};

use crate::arena::locks::TickLocks;
use crate::config::Config;
use crate::db;
use crate::db::games::GameRow;
use crate::engine::hub::EngineHub;
use crate::engine::uci::BestMove;
use crate::engine::{arbiter, movers};
use crate::error::AppError;

pub const RESULT_WHITE_WIN: &str = "1-0";
pub const RESULT_BLACK_WIN: &str = "0-1";
pub const RESULT_DRAW: &str = "1/2-1/2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickResult {
    /// Running, but next_action_at is in the future.
    SkippedNotDue,
    /// Another tick for this game is in flight.
    SkippedLocked,
    /// Not running (configured, paused or finished).
    SkippedTerminal,
    Advanced {
        ply: u32,
    },
    GameFinished {
        result: String,
        reason: TerminationReason,
    },
}

pub async fn run_tick(
    pool: &PgPool,
    hub: &EngineHub,
    locks: &Arc<TickLocks>,
    config: &Config,
    game_id: i64,
    now: DateTime<Utc>,
) -> Result<TickResult, AppError> {
    // Fail fast under contention; never queue. The row lock below is
    // the actual safety mechanism.
    let _guard = match locks.try_acquire(game_id) {
        Some(guard) => guard,
        None => return Ok(TickResult::SkippedLocked),
    };

    let mut tx = pool.begin().await?;
    let game = db::games::get_game_for_update(&mut tx, game_id).await?;

    let status = game
        .status()
        .ok_or_else(|| AppError::Internal(format!("game {game_id} has status '{}'", game.status)))?;
    if status != GameStatus::Running {
        return Ok(TickResult::SkippedTerminal);
    }
    if !game.is_due(now) {
        return Ok(TickResult::SkippedNotDue);
    }

    let side = Side::to_move(game.ply_count as u32);
    let cfg = db::engines::get_config_for_side(&mut tx, game_id, side).await?;

    // Blocks up to the think-time budget plus grace. On timeout or
    // protocol garbage the error propagates, the transaction drops
    // (rollback) and the subprocess is respawned on the next tick.
    let best = movers::best_move(
        hub,
        game_id,
        side,
        &game.fen,
        &[],
        &cfg,
        config.engine_grace_ms,
    )
    .await?;

    let mut keys = db::moves::key_history(&mut tx, game_id).await?;
    if keys.len() as i32 != game.ply_count {
        // Repetition bookkeeping diverged from the move log. Finishing
        // with an error result beats looping on a game we can no longer
        // judge correctly.
        warn!(
            game_id,
            keys = keys.len(),
            ply_count = game.ply_count,
            "inconsistent repetition-key history, finishing game"
        );
        finish_game(
            &mut tx,
            &game,
            RESULT_DRAW,
            TerminationReason::Unknown,
            game.ply_count,
            now,
        )
        .await?;
        tx.commit().await?;
        hub.retire_game(game_id).await;
        return Ok(TickResult::GameFinished {
            result: RESULT_DRAW.to_string(),
            reason: TerminationReason::Unknown,
        });
    }
    keys.insert(0, game.initial_position_key.clone());

    match best {
        BestMove::NoLegalMove => {
            // Terminal signal, not an error: mate or stalemate. The
            // arbiter tells us which by reporting the check flag.
            let facts = arbiter::inspect_position(hub, game_id, &game.fen).await?;
            let outcome = evaluate(&EvalInput {
                fen: &game.fen,
                in_check: facts.in_check,
                has_legal_move: false,
                key_history: &keys,
                ply_count: game.ply_count as u32,
                max_plies: config.max_plies,
            });
            let (result, reason) = outcome_result(&outcome).ok_or_else(|| {
                AppError::Internal(format!(
                    "no-legal-move evaluation did not terminate game {game_id}"
                ))
            })?;
            finish_game(&mut tx, &game, result, reason, game.ply_count, now).await?;
            tx.commit().await?;
            hub.retire_game(game_id).await;
            info!(game_id, result, reason = reason.as_str(), "game finished");
            Ok(TickResult::GameFinished {
                result: result.to_string(),
                reason,
            })
        }
        BestMove::Move(uci) => {
            let applied = arbiter::apply(hub, game_id, &game.fen, &[], &uci).await?;
            let new_ply = game.ply_count + 1;
            keys.push(applied.repetition_key.clone());

            db::moves::append_move(
                &mut tx,
                game_id,
                new_ply,
                &uci,
                &applied.fen,
                &applied.repetition_key,
                applied.in_check,
            )
            .await?;
            db::games::apply_move(
                &mut tx,
                game_id,
                &applied.fen,
                new_ply,
                &uci,
                game.move_interval_ms,
                now,
            )
            .await?;

            let outcome = evaluate(&EvalInput {
                fen: &applied.fen,
                in_check: applied.in_check,
                has_legal_move: true,
                key_history: &keys,
                ply_count: new_ply as u32,
                max_plies: config.max_plies,
            });

            match outcome_result(&outcome) {
                None => {
                    tx.commit().await?;
                    info!(game_id, ply = new_ply, uci = %uci, "tick advanced");
                    Ok(TickResult::Advanced {
                        ply: new_ply as u32,
                    })
                }
                Some((result, reason)) => {
                    finish_game(&mut tx, &game, result, reason, new_ply, now).await?;
                    tx.commit().await?;
                    hub.retire_game(game_id).await;
                    info!(
                        game_id,
                        ply = new_ply,
                        result,
                        reason = reason.as_str(),
                        "game finished"
                    );
                    Ok(TickResult::GameFinished {
                        result: result.to_string(),
                        reason,
                    })
                }
            }
        }
    }
}

/// Terminal write: status/result on the game row plus the dashboard
/// projection, in the same transaction as the move that ended it.
async fn finish_game(
    tx: &mut Transaction<'_, Postgres>,
    game: &GameRow,
    result: &str,
    reason: TerminationReason,
    ply_count: i32,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    db::games::mark_finished(tx, game.id, result, reason, now).await?;
    let white = db::engines::get_config_for_side(tx, game.id, Side::White).await?;
    let black = db::engines::get_config_for_side(tx, game.id, Side::Black).await?;
    db::records::upsert_record(
        tx,
        game,
        &white,
        &black,
        result,
        reason.as_str(),
        ply_count,
        now,
    )
    .await
}

/// Map a terminal evaluation to (score string, reason). `Continue` maps
/// to `None`.
pub fn outcome_result(outcome: &Outcome) -> Option<(&'static str, TerminationReason)> {
    match outcome {
        Outcome::Continue => None,
        Outcome::Checkmate { winner: Side::White } => {
            Some((RESULT_WHITE_WIN, TerminationReason::Checkmate))
        }
        Outcome::Checkmate { winner: Side::Black } => {
            Some((RESULT_BLACK_WIN, TerminationReason::Checkmate))
        }
        Outcome::Stalemate => Some((RESULT_DRAW, TerminationReason::Stalemate)),
        Outcome::InsufficientMaterial => Some((RESULT_DRAW, TerminationReason::Insufficient)),
        Outcome::FiftyMove => Some((RESULT_DRAW, TerminationReason::FiftyMove)),
        Outcome::ThreefoldRepetition => Some((RESULT_DRAW, TerminationReason::Repetition)),
        Outcome::MaxPlies => Some((RESULT_DRAW, TerminationReason::MaxPlies)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_result_mapping() {
        assert_eq!(outcome_result(&Outcome::Continue), None);
        assert_eq!(
            outcome_result(&Outcome::Checkmate {
                winner: Side::White
            }),
            Some((RESULT_WHITE_WIN, TerminationReason::Checkmate))
        );
        assert_eq!(
            outcome_result(&Outcome::Checkmate {
                winner: Side::Black
            }),
            Some((RESULT_BLACK_WIN, TerminationReason::Checkmate))
        );
        assert_eq!(
            outcome_result(&Outcome::ThreefoldRepetition),
            Some((RESULT_DRAW, TerminationReason::Repetition))
        );
        assert_eq!(
            outcome_result(&Outcome::FiftyMove),
            Some((RESULT_DRAW, TerminationReason::FiftyMove))
        );
        assert_eq!(
            outcome_result(&Outcome::MaxPlies),
            Some((RESULT_DRAW, TerminationReason::MaxPlies))
        );
    }

    #[test]
    fn test_tick_result_serializes_tagged() {
        let advanced = serde_json::to_value(TickResult::Advanced { ply: 12 }).unwrap();
        assert_eq!(advanced["kind"], "ADVANCED");
        assert_eq!(advanced["ply"], 12);

        let finished = serde_json::to_value(TickResult::GameFinished {
            result: RESULT_DRAW.to_string(),
            reason: TerminationReason::Repetition,
        })
        .unwrap();
        assert_eq!(finished["kind"], "GAME_FINISHED");
        assert_eq!(finished["reason"], "REPETITION");
    }
}
