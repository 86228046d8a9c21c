//! Arbiter adapter: the sole authority on what a move list does to a
//! position. The orchestrator never computes chess rules itself; it
//! feeds base position + moves to a dedicated engine and reads back the
//! resulting FEN, check flag and repetition key.

use crate::engine::hub::{EngineHub, EngineRole};
use crate::engine::uci::{EngineError, PositionFacts, UciEngine};

/// Apply `new_move` on top of `base_fen` + `history` and report the
/// resulting position. If the engine silently rejects the move (FEN
/// unchanged), that is a protocol violation by the mover — surfaced as
/// a retryable error, never as a game result.
pub async fn apply(
    hub: &EngineHub,
    game_id: i64,
    base_fen: &str,
    history: &[String],
    new_move: &str,
) -> Result<PositionFacts, EngineError> {
    let mut moves = history.to_vec();
    moves.push(new_move.to_string());

    let mut lease = hub.lease(game_id, EngineRole::Arbiter).await?;
    let result = inspect_after(lease.engine_mut()?, base_fen, &moves).await;
    if result.is_err() {
        lease.discard();
        return result;
    }

    let facts = result?;
    if facts.fen.is_empty() || facts.fen == base_fen {
        return Err(EngineError::Protocol(format!(
            "move {new_move} rejected by arbiter (position unchanged)"
        )));
    }
    Ok(facts)
}

/// Derived facts for a position as-is, with no move applied. Used for
/// the initial repetition key and for the no-legal-move path.
pub async fn inspect_position(
    hub: &EngineHub,
    game_id: i64,
    fen: &str,
) -> Result<PositionFacts, EngineError> {
    let mut lease = hub.lease(game_id, EngineRole::Arbiter).await?;
    let result = inspect_after(lease.engine_mut()?, fen, &[]).await;
    if result.is_err() {
        lease.discard();
    }
    result
}

async fn inspect_after(
    engine: &mut UciEngine,
    base_fen: &str,
    moves: &[String],
) -> Result<PositionFacts, EngineError> {
    engine.new_game().await?;
    engine.set_position(base_fen, moves).await?;
    engine.is_ready().await?;
    engine.inspect().await
}
