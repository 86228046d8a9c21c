//! Draw and termination evaluation for automated games.
//!
//! Claimable draws (threefold repetition, fifty-move) are auto-claimed on
//! the ply that first makes them available: with no human at the board,
//! nobody is left to decline, and auto-claiming guarantees every game
//! terminates.

use serde::Serialize;

use crate::fen;
use crate::types::Side;

/// Result of evaluating a position after (or instead of) a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Continue,
    Checkmate { winner: Side },
    Stalemate,
    InsufficientMaterial,
    FiftyMove,
    ThreefoldRepetition,
    MaxPlies,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Continue)
    }
}

/// Everything the evaluator looks at. The key history must be complete:
/// the initial position key followed by one key per recorded move, oldest
/// first. A fixed-size window would miss long repetition cycles.
#[derive(Debug)]
pub struct EvalInput<'a> {
    /// Position after the last recorded move.
    pub fen: &'a str,
    /// Is the side to move in `fen` in check.
    pub in_check: bool,
    /// False when the mover engine reported no legal move for `fen`.
    pub has_legal_move: bool,
    /// Full repetition-key history including the initial position.
    pub key_history: &'a [String],
    /// Number of recorded half-moves.
    pub ply_count: u32,
    /// Hard draw cap so runaway games still end.
    pub max_plies: u32,
}

/// Decide whether the game ends here. Checkmate/stalemate (signalled by
/// the mover having no legal move) win over every draw rule; among the
/// draw rules the cap is checked first, then repetition, fifty-move and
/// insufficient material.
pub fn evaluate(input: &EvalInput<'_>) -> Outcome {
    if !input.has_legal_move {
        if input.in_check {
            // The side to move is mated; its opponent wins.
            let loser = match fen::side_to_move(input.fen) {
                Ok('w') => Side::White,
                Ok(_) => Side::Black,
                Err(_) => return Outcome::Stalemate,
            };
            return Outcome::Checkmate {
                winner: loser.opponent(),
            };
        }
        return Outcome::Stalemate;
    }

    if input.ply_count >= input.max_plies {
        return Outcome::MaxPlies;
    }

    if is_threefold(input.key_history) {
        return Outcome::ThreefoldRepetition;
    }

    if matches!(fen::halfmove_clock(input.fen), Ok(clock) if clock >= 100) {
        return Outcome::FiftyMove;
    }

    if fen::is_insufficient_material(input.fen) {
        return Outcome::InsufficientMaterial;
    }

    Outcome::Continue
}

/// The newest key has occurred three times across the whole history.
fn is_threefold(key_history: &[String]) -> bool {
    let current = match key_history.last() {
        Some(k) if !k.is_empty() => k,
        _ => return false,
    };
    key_history.iter().filter(|k| *k == current).count() >= 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::STARTPOS_FEN;

    fn keys(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn base_input<'a>(fen: &'a str, keys: &'a [String]) -> EvalInput<'a> {
        EvalInput {
            fen,
            in_check: false,
            has_legal_move: true,
            key_history: keys,
            ply_count: keys.len().saturating_sub(1) as u32,
            max_plies: 600,
        }
    }

    #[test]
    fn test_continue_from_startpos() {
        let k = keys(&["a"]);
        assert_eq!(evaluate(&base_input(STARTPOS_FEN, &k)), Outcome::Continue);
    }

    #[test]
    fn test_checkmate_winner_is_opponent_of_side_to_move() {
        // Black to move and mated => White wins.
        let k = keys(&["a", "b"]);
        let mut input = base_input("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR b KQkq - 1 3", &k);
        // Mirror of fool's mate: white to move, in check, no moves => Black wins.
        input.fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        input.in_check = true;
        input.has_legal_move = false;
        assert_eq!(
            evaluate(&input),
            Outcome::Checkmate {
                winner: Side::Black
            }
        );
    }

    #[test]
    fn test_stalemate_when_not_in_check() {
        let k = keys(&["a", "b"]);
        let mut input = base_input("7k/5Q2/6K1/8/8/8/8/8 b - - 0 50", &k);
        input.has_legal_move = false;
        input.in_check = false;
        assert_eq!(evaluate(&input), Outcome::Stalemate);
    }

    #[test]
    fn test_threefold_fires_on_third_occurrence_exactly() {
        // Shuffle cycle: the position keyed "x" recurs. Two occurrences
        // is not yet claimable, the third is.
        let two = keys(&["x", "a", "b", "x"]);
        let fen = "r4rk1/8/8/8/8/8/8/R4RK1 w - - 10 30";
        assert_eq!(evaluate(&base_input(fen, &two)), Outcome::Continue);

        let three = keys(&["x", "a", "b", "x", "c", "d", "x"]);
        assert_eq!(
            evaluate(&base_input(fen, &three)),
            Outcome::ThreefoldRepetition
        );
    }

    #[test]
    fn test_threefold_counts_initial_position() {
        // Initial key + two later recurrences = three occurrences.
        let k = keys(&["x", "a", "x", "b", "x"]);
        let fen = "r4rk1/8/8/8/8/8/8/R4RK1 w - - 8 20";
        assert_eq!(
            evaluate(&base_input(fen, &k)),
            Outcome::ThreefoldRepetition
        );
    }

    #[test]
    fn test_threefold_ignores_empty_keys() {
        let k = keys(&["", "", ""]);
        let fen = "r4rk1/8/8/8/8/8/8/R4RK1 w - - 8 20";
        assert_eq!(evaluate(&base_input(fen, &k)), Outcome::Continue);
    }

    #[test]
    fn test_fifty_move_rule_at_clock_100() {
        let k = keys(&["a", "b"]);
        assert_eq!(
            evaluate(&base_input("r4rk1/8/8/8/8/8/8/R4RK1 w - - 100 80", &k)),
            Outcome::FiftyMove
        );
        assert_eq!(
            evaluate(&base_input("r4rk1/8/8/8/8/8/8/R4RK1 w - - 99 80", &k)),
            Outcome::Continue
        );
    }

    #[test]
    fn test_insufficient_material() {
        let k = keys(&["a", "b"]);
        assert_eq!(
            evaluate(&base_input("8/8/8/8/8/4k3/8/3NK3 w - - 4 40", &k)),
            Outcome::InsufficientMaterial
        );
    }

    #[test]
    fn test_max_plies_cap() {
        let k = keys(&["a", "b"]);
        let mut input = base_input(STARTPOS_FEN, &k);
        input.ply_count = 600;
        assert_eq!(evaluate(&input), Outcome::MaxPlies);
    }

    #[test]
    fn test_mate_wins_over_draw_rules() {
        // Halfmove clock at 100 but the side to move is mated: mate wins.
        let k = keys(&["x", "x", "x"]);
        let mut input = base_input("7k/8/8/8/8/8/8/6RK b - - 100 90", &k);
        input.in_check = true;
        input.has_legal_move = false;
        assert_eq!(
            evaluate(&input),
            Outcome::Checkmate {
                winner: Side::White
            }
        );
    }
}
