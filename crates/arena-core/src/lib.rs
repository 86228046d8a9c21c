//! Pure arena logic shared by the server: sides, statuses, FEN field
//! helpers and the draw/termination evaluator. No I/O in this crate.

pub mod fen;
pub mod rules;
pub mod types;

pub use fen::STARTPOS_FEN;
pub use rules::{evaluate, EvalInput, Outcome};
pub use types::{GameStatus, Side, StrengthMode, TerminationReason};
