//! UCI engine subprocess client.
//!
//! One `UciEngine` owns one long-lived subprocess and speaks the
//! line-oriented UCI protocol over its stdio. Exchanges are strictly
//! sequential per instance; the hub serializes callers with a mutex per
//! engine slot. Every blocking exchange carries a hard timeout, and a
//! timed-out engine is killed so the hub can respawn a fresh one.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// Lines scanned per exchange before giving up. Engines emit `info`
/// chatter between the lines we want; a healthy one never comes close
/// to this bound.
const MAX_SCAN_LINES: u32 = 4096;

/// Budget for handshake / isready / inspect exchanges, which do not
/// involve a search.
const CONTROL_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine did not respond within {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine process error: {0}")]
    Process(String),
}

/// Search response: a concrete move, or the engine's explicit signal
/// that the side to move has no legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestMove {
    Move(String),
    NoLegalMove,
}

/// Derived facts about the engine's current position, from the `d`
/// diagnostic command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionFacts {
    pub fen: String,
    pub in_check: bool,
    /// Zobrist-style position key; equal keys mean repetition-equivalent
    /// positions (placement, side to move, castling and en-passant).
    pub repetition_key: String,
}

pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl UciEngine {
    /// Spawn the subprocess and run the `uci`/`isready` handshake.
    pub async fn spawn(path: &str) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Process(format!("failed to spawn {path}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Process("engine stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Process("engine stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
        };

        engine.send("uci").await?;
        engine.wait_for_exact("uciok", CONTROL_TIMEOUT).await?;
        engine.set_option("Threads", "1").await?;
        Ok(engine)
    }

    pub async fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        self.send(&format!("setoption name {name} value {value}")).await?;
        self.is_ready().await
    }

    /// `ucinewgame` + sync, so state from a previous game cannot leak.
    pub async fn new_game(&mut self) -> Result<(), EngineError> {
        self.send("ucinewgame").await?;
        self.is_ready().await
    }

    /// Send the position without waiting for any output.
    pub async fn set_position(&mut self, fen: &str, moves: &[String]) -> Result<(), EngineError> {
        let mut cmd = format!("position fen {fen}");
        if !moves.is_empty() {
            cmd.push_str(" moves ");
            cmd.push_str(&moves.join(" "));
        }
        self.send(&cmd).await
    }

    pub async fn is_ready(&mut self) -> Result<(), EngineError> {
        self.send("isready").await?;
        self.wait_for_exact("readyok", CONTROL_TIMEOUT).await
    }

    /// Search the current position for `movetime_ms`, blocking until the
    /// `bestmove` line arrives. The hard timeout is strictly greater
    /// than the engine's own budget; on elapse the subprocess is killed
    /// and `EngineError::Timeout` is returned — the caller drops this
    /// instance and respawns on the next call.
    pub async fn go_movetime(
        &mut self,
        movetime_ms: u32,
        grace_ms: u64,
    ) -> Result<BestMove, EngineError> {
        self.send(&format!("go movetime {movetime_ms}")).await?;

        let budget = Duration::from_millis(movetime_ms as u64 + grace_ms);
        let scan = async {
            for _ in 0..MAX_SCAN_LINES {
                let line = self.read_line().await?;
                if let Some(best) = parse_bestmove_line(&line) {
                    return Ok(best);
                }
            }
            Err(EngineError::Protocol(format!(
                "no bestmove within {MAX_SCAN_LINES} lines"
            )))
        };

        match tokio::time::timeout(budget, scan).await {
            Ok(result) => result,
            Err(_) => {
                self.kill().await;
                Err(EngineError::Timeout {
                    budget_ms: budget.as_millis() as u64,
                })
            }
        }
    }

    /// Report derived facts for the current position via the `d`
    /// diagnostic command (non-standard UCI, but universal in
    /// Stockfish-lineage engines). `isready` is sent behind it so the
    /// `readyok` echo marks the end of the diagnostic output.
    pub async fn inspect(&mut self) -> Result<PositionFacts, EngineError> {
        self.send("d").await?;
        self.send("isready").await?;

        let mut scan = DiagnosticScan::default();

        let run = async {
            for _ in 0..MAX_SCAN_LINES {
                let line = self.read_line().await?;
                if scan.absorb(&line) {
                    return Ok(());
                }
            }
            Err(EngineError::Protocol(format!(
                "no readyok within {MAX_SCAN_LINES} lines of 'd' output"
            )))
        };

        match tokio::time::timeout(CONTROL_TIMEOUT, run).await {
            Ok(result) => result?,
            Err(_) => {
                self.kill().await;
                return Err(EngineError::Timeout {
                    budget_ms: CONTROL_TIMEOUT.as_millis() as u64,
                });
            }
        }

        scan.finish()
    }

    /// Best-effort clean shutdown: `quit`, then wait.
    pub async fn quit(mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }

    async fn kill(&mut self) {
        let _ = self.process.kill().await;
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "engine <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| EngineError::Process(format!("failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EngineError::Process(format!("failed to flush engine stdin: {e}")))
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| EngineError::Process(format!("failed to read from engine: {e}")))?;
        if n == 0 {
            return Err(EngineError::Process("engine closed its stdout".into()));
        }
        let trimmed = line.trim_end();
        debug!(line = trimmed, "engine >");
        Ok(trimmed.to_string())
    }

    async fn wait_for_exact(&mut self, token: &str, budget: Duration) -> Result<(), EngineError> {
        let scan = async {
            for _ in 0..MAX_SCAN_LINES {
                if self.read_line().await?.trim() == token {
                    return Ok(());
                }
            }
            Err(EngineError::Protocol(format!(
                "no '{token}' within {MAX_SCAN_LINES} lines"
            )))
        };

        match tokio::time::timeout(budget, scan).await {
            Ok(result) => result,
            Err(_) => {
                self.kill().await;
                Err(EngineError::Timeout {
                    budget_ms: budget.as_millis() as u64,
                })
            }
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // The subprocess must never outlive the client.
        let _ = self.process.start_kill();
    }
}

/// Accumulates the labeled lines of `d` output. `absorb` returns true on
/// the trailing `readyok`; everything unlabeled in between is ignored.
#[derive(Debug, Default)]
pub struct DiagnosticScan {
    fen: Option<String>,
    key: Option<String>,
    checkers: Option<String>,
}

impl DiagnosticScan {
    pub fn absorb(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if let Some(v) = trimmed.strip_prefix("Fen:") {
            self.fen = Some(v.trim().to_string());
        } else if let Some(v) = trimmed.strip_prefix("Key:") {
            self.key = Some(v.trim().to_string());
        } else if let Some(v) = trimmed.strip_prefix("Checkers:") {
            self.checkers = Some(v.trim().to_string());
        } else if trimmed == "readyok" {
            return true;
        }
        false
    }

    pub fn finish(self) -> Result<PositionFacts, EngineError> {
        match (self.fen, self.key, self.checkers) {
            (Some(fen), Some(key), Some(checkers)) => Ok(PositionFacts {
                fen,
                in_check: !checkers.is_empty(),
                repetition_key: key,
            }),
            (fen, key, checkers) => Err(EngineError::Protocol(format!(
                "'d' output incomplete (fen: {}, key: {}, checkers: {})",
                fen.is_some(),
                key.is_some(),
                checkers.is_some()
            ))),
        }
    }
}

/// Parse a `bestmove` response line. `(none)` and `0000` are the
/// engine's explicit no-legal-move signals.
pub fn parse_bestmove_line(line: &str) -> Option<BestMove> {
    let trimmed = line.trim();
    if !trimmed.starts_with("bestmove") {
        return None;
    }
    let token = trimmed.split_whitespace().nth(1)?;
    if token == "(none)" || token == "0000" {
        Some(BestMove::NoLegalMove)
    } else {
        Some(BestMove::Move(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(
            parse_bestmove_line("bestmove e2e4"),
            Some(BestMove::Move("e2e4".into()))
        );
        assert_eq!(
            parse_bestmove_line("bestmove g1f3 ponder b8c6"),
            Some(BestMove::Move("g1f3".into()))
        );
    }

    #[test]
    fn test_parse_bestmove_no_legal_move_signals() {
        assert_eq!(parse_bestmove_line("bestmove (none)"), Some(BestMove::NoLegalMove));
        assert_eq!(parse_bestmove_line("bestmove 0000"), Some(BestMove::NoLegalMove));
    }

    #[test]
    fn test_parse_bestmove_ignores_other_lines() {
        assert_eq!(parse_bestmove_line("info depth 12 score cp 30 pv e2e4"), None);
        assert_eq!(parse_bestmove_line("readyok"), None);
        assert_eq!(parse_bestmove_line("bestmove"), None);
    }

    #[test]
    fn test_diagnostic_scan_with_interleaved_noise() {
        // Stockfish `d` output: ASCII board art, labeled lines, then the
        // fenced readyok from the trailing isready.
        let lines = [
            " +---+---+---+---+---+---+---+---+",
            " | r | n | b | q | k | b | n | r |",
            " +---+---+---+---+---+---+---+---+",
            "Fen: rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "Key: 8F8F01D4562F59FB",
            "Checkers: ",
            "readyok",
        ];
        let mut scan = DiagnosticScan::default();
        let mut done = false;
        for line in lines {
            if scan.absorb(line) {
                done = true;
                break;
            }
        }
        assert!(done);
        let facts = scan.finish().unwrap();
        assert_eq!(
            facts.fen,
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
        assert_eq!(facts.repetition_key, "8F8F01D4562F59FB");
        assert!(!facts.in_check);
    }

    #[test]
    fn test_diagnostic_scan_reports_check() {
        let mut scan = DiagnosticScan::default();
        for line in [
            "Fen: rnbqkbnr/ppppp1pp/8/5p1Q/4P3/8/PPPP1PPP/RNB1KBNR b KQkq - 1 2",
            "Key: 11D23FD305FB402",
            "Checkers: h5",
            "readyok",
        ] {
            if scan.absorb(line) {
                break;
            }
        }
        assert!(scan.finish().unwrap().in_check);
    }

    #[test]
    fn test_diagnostic_scan_missing_label_is_protocol_error() {
        let mut scan = DiagnosticScan::default();
        for line in ["Fen: 8/8/8/8/8/8/8/8 w - - 0 1", "readyok"] {
            if scan.absorb(line) {
                break;
            }
        }
        assert!(matches!(scan.finish(), Err(EngineError::Protocol(_))));
    }
}
