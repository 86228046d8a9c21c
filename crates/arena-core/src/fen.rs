//! Field-level FEN helpers. The arbiter engine is the authority on
//! positions; these only read individual FEN fields the evaluator needs.

use thiserror::Error;

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("FEN is missing the {0} field")]
    MissingField(&'static str),

    #[error("Invalid {0} field: {1}")]
    InvalidField(&'static str, String),
}

/// Side-to-move field ('w' or 'b').
pub fn side_to_move(fen: &str) -> Result<char, FenError> {
    let field = fen
        .split_whitespace()
        .nth(1)
        .ok_or(FenError::MissingField("side-to-move"))?;
    match field {
        "w" => Ok('w'),
        "b" => Ok('b'),
        other => Err(FenError::InvalidField("side-to-move", other.to_string())),
    }
}

/// Halfmove clock field, for the fifty-move rule.
pub fn halfmove_clock(fen: &str) -> Result<u32, FenError> {
    let field = fen
        .split_whitespace()
        .nth(4)
        .ok_or(FenError::MissingField("halfmove clock"))?;
    field
        .parse()
        .map_err(|_| FenError::InvalidField("halfmove clock", field.to_string()))
}

/// Conservative insufficient-material check from the piece placement
/// field: K vs K, K+minor vs K, and bishops-only with at most one bishop
/// per side. Anything with a pawn, rook or queen is treated as playable.
pub fn is_insufficient_material(fen: &str) -> bool {
    let placement = match fen.split_whitespace().next() {
        Some(p) => p,
        None => return false,
    };

    let pieces: Vec<char> = placement
        .chars()
        .filter(|c| c.is_ascii_alphabetic() && *c != 'K' && *c != 'k')
        .collect();

    if pieces.is_empty() {
        return true; // K vs K
    }
    if pieces.iter().any(|c| "PpRrQq".contains(*c)) {
        return false;
    }
    if pieces.len() == 1 {
        return true; // K+B vs K or K+N vs K
    }

    // Bishops only, one per side at most. Without square colors this is
    // the conservative subset of the FIDE dead-position rules.
    let white_bishops = pieces.iter().filter(|c| **c == 'B').count();
    let black_bishops = pieces.iter().filter(|c| **c == 'b').count();
    pieces.iter().all(|c| *c == 'B' || *c == 'b') && white_bishops <= 1 && black_bishops <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_to_move() {
        assert_eq!(side_to_move(STARTPOS_FEN), Ok('w'));
        assert_eq!(
            side_to_move("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"),
            Ok('b')
        );
        assert!(side_to_move("8/8/8/8/8/8/8/8").is_err());
        assert!(side_to_move("8/8/8/8/8/8/8/8 x - - 0 1").is_err());
    }

    #[test]
    fn test_halfmove_clock() {
        assert_eq!(halfmove_clock(STARTPOS_FEN), Ok(0));
        assert_eq!(halfmove_clock("8/8/8/8/8/4k3/8/4K3 w - - 99 120"), Ok(99));
        assert!(halfmove_clock("8/8/8/8/8/4k3/8/4K3 w - -").is_err());
    }

    #[test]
    fn test_insufficient_material() {
        // K vs K
        assert!(is_insufficient_material("8/8/8/8/8/4k3/8/4K3 w - - 0 1"));
        // K+N vs K
        assert!(is_insufficient_material("8/8/8/8/8/4k3/8/3NK3 w - - 0 1"));
        // K+B vs K+B
        assert!(is_insufficient_material("8/8/2b5/8/8/4k3/8/3BK3 w - - 0 1"));
        // Pawn on the board
        assert!(!is_insufficient_material("8/8/8/8/4P3/4k3/8/4K3 w - - 0 1"));
        // Rook endgame
        assert!(!is_insufficient_material("8/8/8/8/8/4k3/8/3RK3 w - - 0 1"));
        // Two bishops one side: not declared dead
        assert!(!is_insufficient_material("8/8/8/8/8/4k3/8/2BBK3 w - - 0 1"));
        // Startpos
        assert!(!is_insufficient_material(STARTPOS_FEN));
    }
}
