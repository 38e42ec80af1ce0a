use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Color, Move, Role, Square};

use crate::error::CoordinatorError;

const FILE_NAMES: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// A move as a client sends it, e.g. `{"from": "e7", "to": "e8", "promotion": "q"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    pub promotion: Option<String>,
}

impl MoveRequest {
    pub fn new(from: &str, to: &str, promotion: Option<&str>) -> MoveRequest {
        MoveRequest {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            promotion: promotion.map(String::from),
        }
    }

    pub fn to_uci(&self) -> Result<UciMove, CoordinatorError> {
        let (Some(from), Some(to)) = (self.from.as_deref(), self.to.as_deref()) else {
            return Err(CoordinatorError::MalformedMove(format!(
                "wrong from or to for move {self}"
            )));
        };

        let from = sq_from_text(from)
            .ok_or_else(|| CoordinatorError::MalformedMove(format!("wrong from square: {from}")))?;
        let to = sq_from_text(to)
            .ok_or_else(|| CoordinatorError::MalformedMove(format!("wrong to square: {to}")))?;

        let promotion = match self.promotion.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(promo_piece_from_text(text).ok_or_else(|| {
                CoordinatorError::MalformedMove(format!("wrong promotion piece: {text}"))
            })?),
        };

        Ok(UciMove::Normal {
            from,
            to,
            promotion,
        })
    }
}

impl Display for MoveRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{text}")
    }
}

/// Wire shape of a move returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveInfo {
    pub uci: String,
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
    pub drop: Option<String>,
    pub is_en_passant: bool,
}

impl MoveInfo {
    /// `mover` is the side playing `m`, it decides the promotion letter's case.
    pub fn new(m: &Move, mover: Color) -> MoveInfo {
        let uci = m.to_uci(CastlingMode::Standard);

        let (from, to, drop) = match uci {
            UciMove::Normal { from, to, .. } => (from, to, None),
            UciMove::Put { role, to } => (to, to, Some(role.char().to_string())),
            // legal move generation never yields a null move
            UciMove::Null => (Square::A1, Square::A1, None),
        };

        MoveInfo {
            uci: uci.to_string(),
            from: sq_name(from),
            to: sq_name(to),
            promotion: m.promotion().map(|role| text_from_promo_piece(role, mover)),
            drop,
            is_en_passant: m.is_en_passant(),
        }
    }
}

pub fn sq_name(sq: Square) -> String {
    let idx = sq as usize;
    format!("{}{}", FILE_NAMES[idx % 8], idx / 8 + 1)
}

fn sq_from_text(sq: &str) -> Option<Square> {
    match sq.trim().as_bytes() {
        &[file @ b'a'..=b'h', rank @ b'1'..=b'8'] => Some(Square::new(
            u32::from(file - b'a') + 8 * u32::from(rank - b'1'),
        )),
        _ => None,
    }
}

fn promo_piece_from_text(p: &str) -> Option<Role> {
    let mut chars = p.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Role::from_char(c.to_ascii_lowercase()),
        _ => None,
    }
}

// white promotions are written upper case, black ones lower case
fn text_from_promo_piece(role: Role, mover: Color) -> String {
    let symbol = role.char();
    match mover {
        Color::White => symbol.to_ascii_uppercase().to_string(),
        Color::Black => symbol.to_string(),
    }
}
