use serde::{Deserialize, Serialize};

/// One side of the board. Stored in Postgres as its `as_str` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::White => "WHITE",
            Side::Black => "BLACK",
        }
    }

    pub fn opponent(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Side to move after `ply_count` recorded half-moves (White moves ply 1).
    pub fn to_move(ply_count: u32) -> Side {
        if ply_count % 2 == 0 {
            Side::White
        } else {
            Side::Black
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "WHITE" => Some(Side::White),
            "BLACK" => Some(Side::Black),
            _ => None,
        }
    }
}

/// Match lifecycle. Finished is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameStatus {
    Configured,
    Running,
    Paused,
    Finished,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Configured => "CONFIGURED",
            GameStatus::Running => "RUNNING",
            GameStatus::Paused => "PAUSED",
            GameStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(s: &str) -> Option<GameStatus> {
        match s {
            "CONFIGURED" => Some(GameStatus::Configured),
            "RUNNING" => Some(GameStatus::Running),
            "PAUSED" => Some(GameStatus::Paused),
            "FINISHED" => Some(GameStatus::Finished),
            _ => None,
        }
    }

    /// Legal externally-triggered transitions. The tick loop never calls
    /// this; it only moves Running games to Finished.
    pub fn can_transition_to(&self, next: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, next),
            (Configured, Running) | (Running, Paused) | (Paused, Running) | (Running, Finished) | (Paused, Finished)
        )
    }
}

/// Why a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    Checkmate,
    Stalemate,
    Repetition,
    FiftyMove,
    Insufficient,
    MaxPlies,
    Unknown,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Checkmate => "CHECKMATE",
            TerminationReason::Stalemate => "STALEMATE",
            TerminationReason::Repetition => "REPETITION",
            TerminationReason::FiftyMove => "FIFTY_MOVE",
            TerminationReason::Insufficient => "INSUFFICIENT",
            TerminationReason::MaxPlies => "MAX_PLIES",
            TerminationReason::Unknown => "UNKNOWN",
        }
    }
}

/// How an engine's strength is configured: Stockfish `Skill Level` (1-20)
/// or a UCI_Elo target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrengthMode {
    Skill,
    Elo,
}

impl StrengthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrengthMode::Skill => "SKILL",
            StrengthMode::Elo => "ELO",
        }
    }

    pub fn parse(s: &str) -> Option<StrengthMode> {
        match s {
            "SKILL" => Some(StrengthMode::Skill),
            "ELO" => Some(StrengthMode::Elo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_to_move_parity() {
        assert_eq!(Side::to_move(0), Side::White);
        assert_eq!(Side::to_move(1), Side::Black);
        assert_eq!(Side::to_move(2), Side::White);
        assert_eq!(Side::to_move(599), Side::Black);
    }

    #[test]
    fn test_status_transitions() {
        assert!(GameStatus::Configured.can_transition_to(GameStatus::Running));
        assert!(GameStatus::Running.can_transition_to(GameStatus::Paused));
        assert!(GameStatus::Paused.can_transition_to(GameStatus::Running));
        assert!(GameStatus::Running.can_transition_to(GameStatus::Finished));
        // Finished is terminal
        assert!(!GameStatus::Finished.can_transition_to(GameStatus::Running));
        assert!(!GameStatus::Finished.can_transition_to(GameStatus::Paused));
        // No skipping Configured -> Paused / Finished
        assert!(!GameStatus::Configured.can_transition_to(GameStatus::Paused));
        assert!(!GameStatus::Configured.can_transition_to(GameStatus::Finished));
    }

    #[test]
    fn test_round_trip_strings() {
        for s in [Side::White, Side::Black] {
            assert_eq!(Side::parse(s.as_str()), Some(s));
        }
        for st in [
            GameStatus::Configured,
            GameStatus::Running,
            GameStatus::Paused,
            GameStatus::Finished,
        ] {
            assert_eq!(GameStatus::parse(st.as_str()), Some(st));
        }
    }
}
