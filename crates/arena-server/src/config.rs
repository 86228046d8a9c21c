use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Path to the UCI engine binary used for movers and the arbiter.
    pub stockfish_path: String,
    /// Default per-move think time when a create request omits it.
    pub default_movetime_ms: u32,
    /// Hard draw cap in half-moves.
    pub max_plies: u32,
    /// Added on top of an engine's movetime budget before the exchange
    /// is declared timed out. Must be > 0 so the engine always gets the
    /// full budget it was asked for.
    pub engine_grace_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            stockfish_path: env::var("STOCKFISH_PATH")
                .unwrap_or_else(|_| "stockfish".to_string()),
            default_movetime_ms: env::var("DEFAULT_MOVETIME_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(150),
            max_plies: env::var("MAX_PLIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            engine_grace_ms: env::var("ENGINE_GRACE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
        }
    }
}
