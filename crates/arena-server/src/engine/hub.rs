//! Process-wide engine registry.
//!
//! One engine subprocess per (game, role), reused across ticks. Slots are
//! created lazily, serialized by a per-slot async mutex (UCI processes
//! are not reentrant mid-command), and torn down when the game finishes
//! or the server shuts down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use arena_core::Side;

use crate::engine::uci::{EngineError, UciEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineRole {
    White,
    Black,
    Arbiter,
}

impl EngineRole {
    pub fn mover(side: Side) -> EngineRole {
        match side {
            Side::White => EngineRole::White,
            Side::Black => EngineRole::Black,
        }
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<UciEngine>>>;

pub struct EngineHub {
    stockfish_path: String,
    slots: Mutex<HashMap<(i64, EngineRole), Slot>>,
}

impl EngineHub {
    pub fn new(stockfish_path: impl Into<String>) -> Self {
        Self {
            stockfish_path: stockfish_path.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Exclusive access to one game's engine for one role, spawning the
    /// subprocess on first use. The lease holds the slot mutex, so all
    /// protocol exchanges through it are strictly sequential.
    pub async fn lease(&self, game_id: i64, role: EngineRole) -> Result<EngineLease, EngineError> {
        let slot = self.slot(game_id, role);
        let mut guard = slot.lock_owned().await;
        if guard.is_none() {
            debug!(game_id, ?role, "spawning engine subprocess");
            *guard = Some(UciEngine::spawn(&self.stockfish_path).await?);
        }
        Ok(EngineLease { guard })
    }

    /// Quit and forget all engines belonging to a finished game.
    pub async fn retire_game(&self, game_id: i64) {
        let retired: Vec<Slot> = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let keys: Vec<_> = slots
                .keys()
                .filter(|(id, _)| *id == game_id)
                .copied()
                .collect();
            keys.iter().filter_map(|k| slots.remove(k)).collect()
        };
        for slot in retired {
            if let Some(engine) = slot.lock().await.take() {
                engine.quit().await;
            }
        }
        debug!(game_id, "retired game engines");
    }

    /// Quit every engine. Called once on server shutdown.
    pub async fn shutdown(&self) {
        let all: Vec<Slot> = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.drain().map(|(_, slot)| slot).collect()
        };
        for slot in all {
            if let Some(engine) = slot.lock().await.take() {
                engine.quit().await;
            }
        }
    }

    fn slot(&self, game_id: i64, role: EngineRole) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry((game_id, role))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }
}

/// A held slot with a live engine inside.
pub struct EngineLease {
    guard: OwnedMutexGuard<Option<UciEngine>>,
}

impl EngineLease {
    pub fn engine_mut(&mut self) -> Result<&mut UciEngine, EngineError> {
        self.guard
            .as_mut()
            .ok_or_else(|| EngineError::Process("engine slot empty".into()))
    }

    /// Throw the subprocess away (killed on drop). Called after any
    /// engine error so the next lease starts a fresh process.
    pub fn discard(&mut self) {
        *self.guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mover_roles() {
        assert_eq!(EngineRole::mover(Side::White), EngineRole::White);
        assert_eq!(EngineRole::mover(Side::Black), EngineRole::Black);
    }

    #[tokio::test]
    async fn test_slots_are_per_game_and_role() {
        let hub = EngineHub::new("nonexistent-engine");
        let a = hub.slot(1, EngineRole::White);
        let b = hub.slot(1, EngineRole::White);
        let c = hub.slot(1, EngineRole::Arbiter);
        let d = hub.slot(2, EngineRole::White);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
    }

    #[tokio::test]
    async fn test_retire_game_drops_slots() {
        let hub = EngineHub::new("nonexistent-engine");
        let _ = hub.slot(7, EngineRole::White);
        let _ = hub.slot(7, EngineRole::Arbiter);
        let _ = hub.slot(8, EngineRole::Black);
        hub.retire_game(7).await;
        let slots = hub.slots.lock().unwrap();
        assert!(slots.keys().all(|(id, _)| *id != 7));
        assert_eq!(slots.len(), 1);
    }
}
