//! Local UCI engine backend (async I/O)

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use tracing::debug;

use crate::error::ReviewError;
use crate::evaluation::{EngineEvaluation, PositionEvaluator};

/// Raw search result, side-to-move perspective
#[derive(Debug, Clone, Default)]
struct SearchResult {
    cp: Option<i32>,
    mate: Option<i32>,
    best_move: Option<String>,
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new engine process and initialize UCI
    pub async fn new(path: &str) -> Result<Self, ReviewError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReviewError::Engine(format!("Failed to spawn engine: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| ReviewError::Engine("Engine stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| ReviewError::Engine("Engine stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine.send("setoption name Threads value 1").await?;
        engine.send("setoption name Hash value 64").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), ReviewError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| ReviewError::Engine(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ReviewError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self, line: &mut String) -> Result<(), ReviewError> {
        line.clear();
        let n = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| ReviewError::Engine(format!("Failed to read from engine: {e}")))?;
        if n == 0 {
            return Err(ReviewError::Engine("Engine closed its output".into()));
        }
        Ok(())
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), ReviewError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    async fn search(&mut self, fen: &str, depth: u8) -> Result<SearchResult, ReviewError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut result = SearchResult::default();
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" pv ") {
                if let Some(cp) = parse_cp(trimmed) {
                    result.cp = Some(cp);
                    result.mate = None;
                }
                if let Some(mate) = parse_mate(trimmed) {
                    result.mate = Some(mate);
                    result.cp = None;
                }
            } else if let Some(rest) = trimmed.strip_prefix("bestmove") {
                result.best_move = crate::evaluation::parse_bestmove(rest);
                break;
            }
        }

        Ok(result)
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

/// [`PositionEvaluator`] over a single local engine process.
pub struct UciEvaluator {
    engine: Mutex<StockfishEngine>,
}

impl UciEvaluator {
    pub async fn spawn(path: &str) -> Result<Self, ReviewError> {
        Ok(Self {
            engine: Mutex::new(StockfishEngine::new(path).await?),
        })
    }

    pub async fn shutdown(&self) {
        self.engine.lock().await.quit().await;
    }
}

impl PositionEvaluator for UciEvaluator {
    async fn evaluate(&self, fen: &str, depth: u8) -> Result<EngineEvaluation, ReviewError> {
        let result = {
            let mut engine = self.engine.lock().await;
            engine.search(fen, depth).await
        }
        .map_err(|e| ReviewError::EvaluationUnavailable(e.to_string()))?;

        let white_to_move = fen.split_whitespace().nth(1) != Some("b");
        to_white_evaluation(result, white_to_move)
    }
}

/// Convert a side-to-move result to White's point of view
fn to_white_evaluation(
    result: SearchResult,
    white_to_move: bool,
) -> Result<EngineEvaluation, ReviewError> {
    let sign = if white_to_move { 1 } else { -1 };
    match (result.mate, result.cp) {
        (Some(m), _) => Ok(EngineEvaluation::from_mate(m * sign, result.best_move)),
        (None, Some(c)) => Ok(EngineEvaluation::from_centipawns(
            f64::from(c * sign),
            result.best_move,
        )),
        (None, None) => Err(ReviewError::EvaluationUnavailable(
            "Engine reported no score".into(),
        )),
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "cp" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "mate" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 13 seldepth 18 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 13 score mate -3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(-3));
        assert_eq!(parse_cp(line), None);
    }

    #[test]
    fn test_black_to_move_score_is_flipped() {
        let result = SearchResult {
            cp: Some(50),
            mate: None,
            best_move: Some("e7e5".into()),
        };
        let eval = to_white_evaluation(result, false).unwrap();
        assert_eq!(eval.score_centipawns, -50.0);

        let mated = SearchResult {
            cp: None,
            mate: Some(2),
            best_move: None,
        };
        let eval = to_white_evaluation(mated, false).unwrap();
        assert_eq!(eval.mate_in, Some(-2));
    }

    #[test]
    fn test_missing_score_is_unavailable() {
        assert!(to_white_evaluation(SearchResult::default(), true).is_err());
    }
}
