use std::mem;

use shakmaty::Move;

use crate::board::Board;

struct Ply {
    // board the move was played from
    board: Board,
    m: Move,
}

/// The current board plus every move applied since the last reset or fen set.
pub struct GameState {
    board: Board,
    prev_moves: Vec<Ply>,
}

impl GameState {
    pub fn new() -> GameState {
        GameState {
            board: Board::new(),
            prev_moves: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn fen(&self) -> String {
        self.board.fen()
    }

    pub fn history_len(&self) -> usize {
        self.prev_moves.len()
    }

    pub fn set_position(&mut self, board: Board) {
        self.board = board;
        self.prev_moves.clear();
    }

    pub fn reset(&mut self) {
        self.set_position(Board::new());
    }

    /// `m` must be legal on the current board.
    pub fn push(&mut self, m: Move) {
        let next = self.board.copy_make(&m);
        let board = mem::replace(&mut self.board, next);
        self.prev_moves.push(Ply { board, m });
    }

    pub fn pop(&mut self) -> Option<Move> {
        let ply = self.prev_moves.pop()?;
        self.board = ply.board;
        Some(ply.m)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
