//! Mover pool: "best move for this side, in this position, within this
//! think-time budget", against the engine bound to the side's config.

use arena_core::{Side, StrengthMode};

use crate::db::engines::EngineConfigRow;
use crate::engine::hub::{EngineHub, EngineRole};
use crate::engine::uci::{BestMove, EngineError, UciEngine};

/// Ask the side's engine for its move. `BestMove::NoLegalMove` is a
/// normal terminal signal (checkmate or stalemate, the evaluator
/// decides), never an error.
pub async fn best_move(
    hub: &EngineHub,
    game_id: i64,
    side: Side,
    fen: &str,
    moves: &[String],
    cfg: &EngineConfigRow,
    grace_ms: u64,
) -> Result<BestMove, EngineError> {
    let mut lease = hub.lease(game_id, EngineRole::mover(side)).await?;
    let result = search(lease.engine_mut()?, fen, moves, cfg, grace_ms).await;
    if result.is_err() {
        lease.discard();
    }
    result
}

async fn search(
    engine: &mut UciEngine,
    fen: &str,
    moves: &[String],
    cfg: &EngineConfigRow,
    grace_ms: u64,
) -> Result<BestMove, EngineError> {
    // Reset per move so strength options never leak across games
    // sharing a slot after restarts.
    engine.new_game().await?;
    apply_strength(engine, cfg).await?;
    engine.set_position(fen, moves).await?;
    engine.is_ready().await?;
    engine.go_movetime(cfg.movetime_ms as u32, grace_ms).await
}

/// Strength mapping: SKILL drives `Skill Level` with limiting off, ELO
/// turns limiting on and sets the target rating.
async fn apply_strength(engine: &mut UciEngine, cfg: &EngineConfigRow) -> Result<(), EngineError> {
    match cfg.mode() {
        Some(StrengthMode::Skill) => {
            engine.set_option("UCI_LimitStrength", "false").await?;
            engine
                .set_option("Skill Level", &cfg.strength_value.to_string())
                .await
        }
        Some(StrengthMode::Elo) => {
            engine.set_option("UCI_LimitStrength", "true").await?;
            engine
                .set_option("UCI_Elo", &cfg.strength_value.to_string())
                .await
        }
        None => Err(EngineError::Protocol(format!(
            "unknown strength mode '{}'",
            cfg.strength_mode
        ))),
    }
}
