use std::fmt::{self, Display, Formatter};

use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, Move, Position};

use crate::error::InvalidFenError;
use crate::fen::{mirror_fen, parse_fen, serialize_fen};

/// A standard chess position. Moves never mutate a board in place, they
/// produce the next one with `copy_make`.
#[derive(Clone, Debug, Default)]
pub struct Board {
    pos: Chess,
}

impl Board {
    pub fn new() -> Board {
        Board::default()
    }

    pub fn new_fen(fen: &str) -> Result<Board, InvalidFenError> {
        Ok(Board {
            pos: parse_fen(fen)?,
        })
    }

    pub fn fen(&self) -> String {
        serialize_fen(&self.pos)
    }

    pub fn ctm(&self) -> Color {
        self.pos.turn()
    }

    pub fn is_check(&self) -> bool {
        self.pos.is_check()
    }

    pub fn is_game_over(&self) -> bool {
        self.pos.is_game_over()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    /// Resolves a uci move against this board, `None` when it is not legal here.
    pub fn legal_move(&self, uci: &UciMove) -> Option<Move> {
        uci.to_move(&self.pos).ok()
    }

    pub fn parse_uci(&self, text: &str) -> Option<Move> {
        let uci: UciMove = text.trim().parse().ok()?;
        self.legal_move(&uci)
    }

    /// `m` must be legal on this board.
    pub fn copy_make(&self, m: &Move) -> Board {
        let mut pos = self.pos.clone();
        pos.play_unchecked(m);
        Board { pos }
    }

    pub fn mirror(&self) -> Result<Board, InvalidFenError> {
        Board::new_fen(&mirror_fen(&self.fen())?)
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOLS_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";

    #[test]
    fn start_position_has_twenty_moves() {
        let b = Board::new();

        assert_eq!(20, b.legal_moves().len());
        assert_eq!(Color::White, b.ctm());
        assert!(!b.is_check());
        assert!(!b.is_game_over());
    }

    #[test]
    fn checkmate_has_no_moves() {
        let b = Board::new_fen(FOOLS_MATE).unwrap();

        assert!(b.is_check());
        assert!(b.is_game_over());
        assert!(b.legal_moves().is_empty());
    }

    #[test]
    fn copy_make_leaves_board_untouched() {
        let b = Board::new();
        let m = b.parse_uci("e2e4").unwrap();
        let next = b.copy_make(&m);

        assert_eq!(crate::fen::START_FEN, b.fen());
        assert_eq!(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
            next.fen()
        );
        assert_eq!(Color::Black, next.ctm());
    }

    #[test]
    fn illegal_uci_is_rejected() {
        let b = Board::new();

        assert!(b.parse_uci("e2e5").is_none());
        assert!(b.parse_uci("e7e5").is_none());
        assert!(b.parse_uci("nonsense").is_none());
        assert!(b.parse_uci("g1f3").is_some());
    }

    #[test]
    fn mirror_swaps_side_to_move() {
        let b = Board::new().mirror().unwrap();

        assert_eq!(Color::Black, b.ctm());
        assert_eq!(20, b.legal_moves().len());

        let after_e4 = Board::new_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
            .unwrap()
            .mirror()
            .unwrap();
        assert_eq!(
            "rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            after_e4.fen()
        );
    }
}
