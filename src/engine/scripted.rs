use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use shakmaty::CastlingMode;

use super::{EngineParameters, ParameterPatch, SearchEngine, TopMove};
use crate::board::Board;
use crate::error::EngineError;

#[derive(Default)]
struct Script {
    pushed: Vec<String>,
    failing: bool,
    best_move: Option<String>,
    parameters: EngineParameters,
}

/// In-memory engine for tests: remembers every pushed fen and plays the first
/// legal move of the last one unless told otherwise. Clones share the same
/// script.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn new() -> ScriptedEngine {
        ScriptedEngine::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.script().failing = failing;
    }

    /// Makes `best_move` answer `uci` instead of the first legal move.
    pub fn script_best_move(&self, uci: &str) {
        self.script().best_move = Some(uci.to_string());
    }

    pub fn pushed(&self) -> Vec<String> {
        self.script().pushed.clone()
    }

    pub fn last_fen(&self) -> Option<String> {
        self.script().pushed.last().cloned()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.script().failing {
            return Err(EngineError::Timeout(Duration::from_millis(0)));
        }
        Ok(())
    }

    fn board(&self) -> Result<Board, EngineError> {
        let fen = self
            .last_fen()
            .ok_or_else(|| EngineError::UnexpectedReply("no position set".into()))?;
        Board::new_fen(&fen).map_err(|err| EngineError::UnexpectedReply(err.to_string()))
    }
}

#[async_trait]
impl SearchEngine for ScriptedEngine {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.check()?;
        self.script().pushed.push(fen.to_string());
        Ok(())
    }

    async fn best_move(&mut self) -> Result<Option<String>, EngineError> {
        self.check()?;
        let scripted = self.script().best_move.clone();
        if scripted.is_some() {
            return Ok(scripted);
        }
        let board = self.board()?;

        Ok(board
            .legal_moves()
            .first()
            .map(|m| m.to_uci(CastlingMode::Standard).to_string()))
    }

    async fn top_moves(&mut self, count: usize) -> Result<Vec<TopMove>, EngineError> {
        self.check()?;
        let board = self.board()?;

        Ok(board
            .legal_moves()
            .iter()
            .take(count)
            .enumerate()
            .map(|(rank, m)| TopMove {
                uci: m.to_uci(CastlingMode::Standard).to_string(),
                centipawn: Some(100 - 10 * rank as i32),
                mate: None,
            })
            .collect())
    }

    fn parameters(&self) -> EngineParameters {
        self.script().parameters.clone()
    }

    async fn set_parameters(&mut self, patch: &ParameterPatch) -> Result<(), EngineError> {
        self.check()?;
        self.script().parameters.apply(patch);
        Ok(())
    }
}
