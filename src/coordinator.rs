//! Keeps the board and the search engine looking at the same position.
//!
//! Every operation that changes the board ends by pushing the new fen to the
//! engine. If that push fails the board change stands and the error is
//! reported; the next engine query or successful mutation pushes again.

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use shakmaty::{CastlingMode, Color};
use tokio::sync::Mutex;

use crate::board::Board;
use crate::engine::{EngineParameters, ParameterPatch, SearchEngine, TopMove};
use crate::error::{CoordinatorError, EngineError};
use crate::game_state::GameState;
use crate::moves::{MoveInfo, MoveRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub is_check: bool,
    pub turn: Side,
    pub game_over: bool,
}

/// The engine plus the fen it was last successfully given.
pub struct EngineSession<E> {
    engine: E,
    synced_fen: Option<String>,
}

impl<E: SearchEngine> EngineSession<E> {
    fn new(engine: E) -> EngineSession<E> {
        EngineSession {
            engine,
            synced_fen: None,
        }
    }

    async fn sync(&mut self, fen: String) -> Result<(), EngineError> {
        self.synced_fen = None;
        self.engine.set_position(&fen).await?;
        self.synced_fen = Some(fen);
        Ok(())
    }

    async fn ensure_synced(&mut self, fen: String) -> Result<(), EngineError> {
        if self.synced_fen.as_deref() == Some(fen.as_str()) {
            return Ok(());
        }

        debug!("engine is behind the board, pushing {fen}");
        self.sync(fen).await
    }
}

struct Session<E> {
    game_state: GameState,
    engine: EngineSession<E>,
}

impl<E: SearchEngine> Session<E> {
    async fn resync(&mut self) -> Result<(), CoordinatorError> {
        let fen = self.game_state.fen();

        self.engine.sync(fen).await.map_err(|err| {
            warn!("engine lost sync with the board: {err}");
            CoordinatorError::from(err)
        })
    }

    async fn catch_up(&mut self) -> Result<(), CoordinatorError> {
        let fen = self.game_state.fen();
        Ok(self.engine.ensure_synced(fen).await?)
    }
}

/// Sole owner of the game state and the engine session.
pub struct PositionCoordinator<E> {
    session: Mutex<Session<E>>,
}

impl<E: SearchEngine> PositionCoordinator<E> {
    /// Starts from the initial position and pushes it to `engine`.
    pub async fn new(engine: E) -> Result<PositionCoordinator<E>, EngineError> {
        let game_state = GameState::new();
        let mut engine = EngineSession::new(engine);
        engine.sync(game_state.fen()).await?;

        Ok(PositionCoordinator {
            session: Mutex::new(Session { game_state, engine }),
        })
    }

    pub fn into_engine(self) -> E {
        self.session.into_inner().engine.engine
    }

    pub async fn get_fen(&self) -> String {
        self.session.lock().await.game_state.fen()
    }

    pub async fn set_fen(&self, fen: &str) -> Result<(), CoordinatorError> {
        let board = Board::new_fen(fen)?;

        let mut session = self.session.lock().await;
        session.game_state.set_position(board);
        info!("fen updated to {}", session.game_state.fen());

        session.resync().await
    }

    pub async fn get_best_move(&self) -> Result<Option<String>, CoordinatorError> {
        let mut session = self.session.lock().await;
        session.catch_up().await?;

        Ok(session.engine.engine.best_move().await?)
    }

    pub async fn apply_move(&self, request: &MoveRequest) -> Result<(), CoordinatorError> {
        let uci = request.to_uci()?;

        let mut session = self.session.lock().await;
        let m = session
            .game_state
            .board()
            .legal_move(&uci)
            .ok_or_else(|| CoordinatorError::IllegalMove(uci.to_string()))?;

        session.game_state.push(m);
        debug!("played {uci}");

        session.resync().await
    }

    /// Returns the undone move in uci notation.
    pub async fn undo_last_move(&self) -> Result<Option<String>, CoordinatorError> {
        let mut session = self.session.lock().await;

        let Some(m) = session.game_state.pop() else {
            return Ok(None);
        };
        let uci = m.to_uci(CastlingMode::Standard).to_string();
        debug!("took back {uci}");

        session.resync().await?;
        Ok(Some(uci))
    }

    pub async fn apply_engine_best_move(&self) -> Result<Option<MoveInfo>, CoordinatorError> {
        let mut session = self.session.lock().await;
        session.catch_up().await?;

        let Some(best) = session.engine.engine.best_move().await? else {
            return Ok(None);
        };

        let board = session.game_state.board();
        let m = board
            .parse_uci(&best)
            .ok_or_else(|| EngineError::UnexpectedReply(format!("bestmove {best}")))?;
        let played = MoveInfo::new(&m, board.ctm());

        session.game_state.push(m);
        debug!("engine played {}", played.uci);

        session.resync().await?;
        Ok(Some(played))
    }

    pub async fn list_legal_moves(&self) -> Vec<MoveInfo> {
        let board = self.session.lock().await.game_state.board().clone();
        let mover = board.ctm();

        board
            .legal_moves()
            .iter()
            .map(|m| MoveInfo::new(m, mover))
            .collect()
    }

    pub async fn reset_to_start(&self) -> Result<(), CoordinatorError> {
        let mut session = self.session.lock().await;
        session.game_state.reset();
        info!("board reset");

        session.resync().await
    }

    pub async fn mirror_board(&self) -> Result<(), CoordinatorError> {
        let mut session = self.session.lock().await;
        let mirrored = session.game_state.board().mirror()?;
        session.game_state.set_position(mirrored);
        info!("board flipped, new fen: {}", session.game_state.fen());

        session.resync().await
    }

    pub async fn get_board_summary(&self) -> BoardSummary {
        let session = self.session.lock().await;
        let board = session.game_state.board();

        BoardSummary {
            is_check: board.is_check(),
            turn: board.ctm().into(),
            game_over: board.is_game_over(),
        }
    }

    pub async fn get_engine_parameters(&self) -> EngineParameters {
        self.session.lock().await.engine.engine.parameters()
    }

    /// Applies the allow-listed keys of `body`, unknown keys are dropped.
    pub async fn set_engine_parameters(
        &self,
        body: &Map<String, Value>,
    ) -> Result<(), CoordinatorError> {
        let patch = ParameterPatch::from_json(body)?;
        if patch.is_empty() {
            debug!("no engine parameter to set in {}", Value::Object(body.clone()));
            return Ok(());
        }

        let mut session = self.session.lock().await;
        session.engine.engine.set_parameters(&patch).await?;
        info!("engine parameters set: {:?}", patch);

        Ok(())
    }

    pub async fn get_top_moves(&self, count: usize) -> Result<Vec<TopMove>, CoordinatorError> {
        let mut session = self.session.lock().await;
        session.catch_up().await?;

        Ok(session.engine.engine.top_moves(count).await?)
    }

    pub async fn history_len(&self) -> usize {
        self.session.lock().await.game_state.history_len()
    }

    /// The fen the engine last accepted, `None` after a failed push.
    pub async fn engine_fen(&self) -> Option<String> {
        self.session.lock().await.engine.synced_fen.clone()
    }
}
