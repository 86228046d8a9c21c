use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Apply the full schema inline at startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Games: one automated match each. The tick orchestrator is the sole
-- mutator of fen/ply_count/next_action_at/status after start.
CREATE TABLE IF NOT EXISTS games (
    id                   BIGSERIAL PRIMARY KEY,
    status               TEXT NOT NULL DEFAULT 'CONFIGURED',
    fen                  TEXT NOT NULL,
    ply_count            INTEGER NOT NULL DEFAULT 0,
    move_interval_ms     INTEGER NOT NULL DEFAULT 500,
    next_action_at       TIMESTAMPTZ,
    last_move_uci        TEXT NOT NULL DEFAULT '',
    result               TEXT NOT NULL DEFAULT '',
    termination_reason   TEXT NOT NULL DEFAULT '',
    initial_position_key TEXT NOT NULL DEFAULT '',
    started_at           TIMESTAMPTZ,
    finished_at          TIMESTAMPTZ,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_games_status ON games (status);

-- Engine configuration, one row per side. Immutable once the game has
-- left CONFIGURED (enforced at the update endpoint).
CREATE TABLE IF NOT EXISTS engine_configs (
    id             BIGSERIAL PRIMARY KEY,
    game_id        BIGINT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    side           TEXT NOT NULL,
    strength_mode  TEXT NOT NULL DEFAULT 'SKILL',
    strength_value INTEGER NOT NULL DEFAULT 10,
    movetime_ms    INTEGER NOT NULL DEFAULT 150,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE(game_id, side)
);

-- Append-only half-move log. Never updated or deleted while the game
-- exists; ply_index is dense and 1-based.
CREATE TABLE IF NOT EXISTS moves (
    id                 BIGSERIAL PRIMARY KEY,
    game_id            BIGINT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    ply_index          INTEGER NOT NULL,
    uci                TEXT NOT NULL,
    fen_after          TEXT NOT NULL,
    position_key_after TEXT NOT NULL DEFAULT '',
    is_check           BOOLEAN NOT NULL DEFAULT FALSE,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE(game_id, ply_index)
);

CREATE INDEX IF NOT EXISTS idx_moves_game_key
    ON moves (game_id, position_key_after);

-- Denormalized dashboard projection, rebuildable from games + moves.
CREATE TABLE IF NOT EXISTS match_records (
    id                   BIGSERIAL PRIMARY KEY,
    game_id              BIGINT NOT NULL UNIQUE REFERENCES games(id) ON DELETE CASCADE,
    result               TEXT NOT NULL,
    termination_reason   TEXT NOT NULL,
    white_strength_mode  TEXT NOT NULL,
    white_strength_value INTEGER NOT NULL,
    black_strength_mode  TEXT NOT NULL,
    black_strength_value INTEGER NOT NULL,
    move_interval_ms     INTEGER NOT NULL,
    ply_count            INTEGER NOT NULL,
    finished_at          TIMESTAMPTZ NOT NULL,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_match_records_finished
    ON match_records (finished_at DESC);
"#;
