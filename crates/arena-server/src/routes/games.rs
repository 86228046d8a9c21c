use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use std::sync::Arc;
use validator::Validate;

use arena_core::{GameStatus, Side, StrengthMode, STARTPOS_FEN};

use crate::config::Config;
use crate::db;
use crate::engine::arbiter;
use crate::engine::hub::EngineHub;
use crate::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct EngineChoice {
    pub strength_mode: StrengthMode,
    pub strength_value: i32,
    #[validate(range(min = 20, max = 10000))]
    pub movetime_ms: Option<i32>,
}

impl EngineChoice {
    /// Range check depends on the mode, which validator's derive can't
    /// express: Skill Level is 1..=20, UCI_Elo roughly 500..=3200.
    fn check_strength(&self, side: &str) -> Result<(), AppError> {
        let ok = match self.strength_mode {
            StrengthMode::Skill => (1..=20).contains(&self.strength_value),
            StrengthMode::Elo => (500..=3200).contains(&self.strength_value),
        };
        if ok {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "{side}: strength_value {} out of range for {}",
                self.strength_value,
                self.strength_mode.as_str()
            )))
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGameRequest {
    #[validate(nested)]
    pub white: EngineChoice,
    #[validate(nested)]
    pub black: EngineChoice,
    #[validate(range(min = 100, max = 60000))]
    pub move_interval_ms: Option<i32>,
}

/// POST /api/games — create a CONFIGURED game with both engine configs.
pub async fn create_game(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Config>,
    Extension(hub): Extension<Arc<EngineHub>>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<Json<JsonValue>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    payload.white.check_strength("white")?;
    payload.black.check_strength("black")?;

    let move_interval_ms = payload.move_interval_ms.unwrap_or(500);
    let default_movetime = config.default_movetime_ms as i32;

    let mut tx = pool.begin().await?;
    let game = db::games::create_game(&mut tx, move_interval_ms).await?;
    let white = db::engines::insert_config(
        &mut tx,
        game.id,
        Side::White,
        payload.white.strength_mode,
        payload.white.strength_value,
        payload.white.movetime_ms.unwrap_or(default_movetime),
    )
    .await?;
    let black = db::engines::insert_config(
        &mut tx,
        game.id,
        Side::Black,
        payload.black.strength_mode,
        payload.black.strength_value,
        payload.black.movetime_ms.unwrap_or(default_movetime),
    )
    .await?;
    tx.commit().await?;

    // Seed the repetition key of the initial position so threefold
    // counting includes it. Best effort: an engine hiccup here leaves
    // the key empty, exactly like the original behavior.
    match arbiter::inspect_position(&hub, game.id, STARTPOS_FEN).await {
        Ok(facts) => {
            db::games::set_initial_position_key(&pool, game.id, &facts.repetition_key).await?;
        }
        Err(e) => {
            tracing::warn!(game_id = game.id, error = %e, "could not seed initial position key");
        }
    }

    let game = db::games::get_game(&pool, game.id).await?;
    Ok(Json(json!({
        "game": game,
        "engines": { "white": white, "black": black },
    })))
}

#[derive(Debug, Deserialize)]
pub struct GetGameQuery {
    #[serde(default)]
    pub moves: bool,
}

/// GET /api/games/{game_id}?moves=true
pub async fn get_game(
    Extension(pool): Extension<PgPool>,
    Path(game_id): Path<i64>,
    Query(params): Query<GetGameQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let game = db::games::get_game(&pool, game_id).await?;
    let engines = db::engines::get_configs(&pool, game_id).await?;
    let mut body = json!({ "game": game, "engines": engines });
    if params.moves {
        let moves = db::moves::list_moves(&pool, game_id).await?;
        body["moves"] = json!(moves);
    }
    Ok(Json(body))
}

/// GET /api/games/{game_id}/moves — the append-only half-move log.
pub async fn list_moves(
    Extension(pool): Extension<PgPool>,
    Path(game_id): Path<i64>,
) -> Result<Json<JsonValue>, AppError> {
    // 404 on unknown game rather than an empty list.
    let game = db::games::get_game(&pool, game_id).await?;
    let moves = db::moves::list_moves(&pool, game_id).await?;
    Ok(Json(json!({ "game_id": game.id, "moves": moves })))
}

/// POST /api/games/{game_id}/control/{action} — start | pause | resume.
///
/// These transitions are externally triggered; the tick orchestrator
/// never drives them. Invalid transitions are 409s, and Finished is a
/// wall: nothing leaves it.
pub async fn control(
    Extension(pool): Extension<PgPool>,
    Path((game_id, action)): Path<(i64, String)>,
) -> Result<Json<JsonValue>, AppError> {
    let mut tx = pool.begin().await?;
    let game = db::games::get_game_for_update(&mut tx, game_id).await?;
    let status = game
        .status()
        .ok_or_else(|| AppError::Internal(format!("game {game_id} has status '{}'", game.status)))?;

    let updated = match action.as_str() {
        "start" | "resume" => {
            if !status.can_transition_to(GameStatus::Running) {
                return Err(AppError::Conflict(format!(
                    "cannot start game in status {}",
                    game.status
                )));
            }
            if status == GameStatus::Configured {
                let (count,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM engine_configs WHERE game_id = $1")
                        .bind(game_id)
                        .fetch_one(&mut *tx)
                        .await?;
                if count != 2 {
                    return Err(AppError::Conflict(
                        "game needs both engine configs before starting".to_string(),
                    ));
                }
            }
            db::games::mark_started(&mut tx, game_id, chrono::Utc::now()).await?
        }
        "pause" => {
            if !status.can_transition_to(GameStatus::Paused) {
                return Err(AppError::Conflict(format!(
                    "cannot pause game in status {}",
                    game.status
                )));
            }
            db::games::mark_paused(&mut tx, game_id).await?
        }
        other => {
            return Err(AppError::BadRequest(format!("unknown action '{other}'")));
        }
    };
    tx.commit().await?;

    Ok(Json(json!({ "game": updated })))
}
