use axum::{extract::Path, Extension, Json};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use std::sync::Arc;

use crate::arena::locks::TickLocks;
use crate::arena::tick::run_tick;
use crate::config::Config;
use crate::db;
use crate::engine::hub::EngineHub;
use crate::error::AppError;

/// POST /api/games/{game_id}/tick
///
/// Safe to call repeatedly and concurrently: not-due, locked and
/// terminal ticks are no-ops reported as such. An engine failure is a
/// 502 with the game row untouched; the caller's next poll retries.
pub async fn post_tick(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Config>,
    Extension(hub): Extension<Arc<EngineHub>>,
    Extension(locks): Extension<Arc<TickLocks>>,
    Path(game_id): Path<i64>,
) -> Result<Json<JsonValue>, AppError> {
    let now = chrono::Utc::now();
    let result = run_tick(&pool, &hub, &locks, &config, game_id, now).await?;
    let game = db::games::get_game(&pool, game_id).await?;
    Ok(Json(json!({ "tick": result, "game": game })))
}
