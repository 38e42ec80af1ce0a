use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode};

use crate::error::InvalidFenError;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const CASTLE_ORDER: &str = "KQkq";

pub fn parse_fen(fen: &str) -> Result<Chess, InvalidFenError> {
    let fen: Fen = fen.trim().parse()?;

    fen.into_position(CastlingMode::Standard)
        .map_err(|err| InvalidFenError::Position(err.to_string()))
}

/// The en passant square is only written when a capture on it is legal, the
/// same normalisation every other chess tool applies.
pub fn serialize_fen(pos: &Chess) -> String {
    Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
}

/// Flips the board vertically and swaps the colours of every piece, the side
/// to move and the castling rights. Move counters are kept.
pub fn mirror_fen(fen: &str) -> Result<String, InvalidFenError> {
    let fen = fen.trim();

    Ok(format!(
        "{} {} {} {} {} {}",
        mirror_pieces(fen)?,
        mirror_ctm(fen)?,
        mirror_castle_state(fen)?,
        mirror_ep_sq(fen)?,
        counter_from_fen(fen, 4, "halfmove", "0")?,
        counter_from_fen(fen, 5, "fullmove", "1")?,
    ))
}

fn field<'a>(fen: &'a str, n: usize, name: &'static str) -> Result<&'a str, InvalidFenError> {
    fen.split_whitespace()
        .nth(n)
        .ok_or(InvalidFenError::MissingField(name))
}

fn bad_field(field: &'static str, value: &str) -> InvalidFenError {
    InvalidFenError::BadField {
        field,
        value: value.to_string(),
    }
}

fn swap_case(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect()
}

fn mirror_pieces(fen: &str) -> Result<String, InvalidFenError> {
    let pieces = field(fen, 0, "pieces")?;

    let rows: Vec<&str> = pieces.split('/').collect();
    if rows.len() != 8 {
        return Err(bad_field("pieces", pieces));
    }

    // rows are listed from rank 8 down, reversing them flips the board
    Ok(rows
        .iter()
        .rev()
        .map(|row| swap_case(row))
        .collect::<Vec<_>>()
        .join("/"))
}

fn mirror_ctm(fen: &str) -> Result<&'static str, InvalidFenError> {
    match field(fen, 1, "side to move")? {
        "w" => Ok("b"),
        "b" => Ok("w"),
        ctm => Err(bad_field("side to move", ctm)),
    }
}

fn mirror_castle_state(fen: &str) -> Result<String, InvalidFenError> {
    let castle_state = field(fen, 2, "castle state")?;
    if castle_state == "-" {
        return Ok(castle_state.to_string());
    }

    let mut mirrored: Vec<(usize, char)> = swap_case(castle_state)
        .chars()
        .map(|c| {
            CASTLE_ORDER
                .find(c)
                .map(|order| (order, c))
                .ok_or_else(|| bad_field("castle state", castle_state))
        })
        .collect::<Result<_, _>>()?;
    mirrored.sort_unstable();

    Ok(mirrored.into_iter().map(|(_, c)| c).collect())
}

fn mirror_ep_sq(fen: &str) -> Result<String, InvalidFenError> {
    let ep_sq = field(fen, 3, "ep square")?;
    if ep_sq == "-" {
        return Ok(ep_sq.to_string());
    }

    match ep_sq.as_bytes() {
        &[file @ b'a'..=b'h', rank @ b'1'..=b'8'] => {
            Ok(format!("{}{}", file as char, (b'1' + b'8' - rank) as char))
        }
        _ => Err(bad_field("ep square", ep_sq)),
    }
}

fn counter_from_fen(
    fen: &str,
    n: usize,
    name: &'static str,
    default: &str,
) -> Result<String, InvalidFenError> {
    let Some(counter) = fen.split_whitespace().nth(n) else {
        return Ok(default.to_string());
    };

    counter
        .parse::<u32>()
        .map(|value| value.to_string())
        .map_err(|_| bad_field(name, counter))
}

#[test]
fn test_fens() -> Result<(), InvalidFenError> {
    let good_fens = [
        START_FEN,
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2",
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2 ",
        "     rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2     ",
    ];

    for fen in good_fens {
        parse_fen(fen)?;
    }

    let bad_fens = [
        "",
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR KQkq - 0 1",
        "rnbaqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQxq c6 0 2",
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkqz c6 0 2",
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq r5 1 2 ",
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - -1 2 ",
        "8/8/8/8/8/8/8/8 w - - 0 1",
    ];

    for fen in bad_fens {
        assert!(parse_fen(fen).is_err(), "{fen} should not parse");
    }

    Ok(())
}

#[test]
fn test_serialize_round_trip() -> Result<(), InvalidFenError> {
    let fens = [
        START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
    ];

    for fen in fens {
        assert_eq!(fen, serialize_fen(&parse_fen(fen)?));
    }

    // shredder style castling files come back in standard notation
    let pos = parse_fen("rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KaQkq c6 0 2")?;
    assert_eq!(
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        serialize_fen(&pos)
    );

    // no black pawn can take on e3, so the square is dropped
    let pos = parse_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")?;
    assert_eq!(
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
        serialize_fen(&pos)
    );

    Ok(())
}

#[test]
fn test_mirror_fen() -> Result<(), InvalidFenError> {
    assert_eq!(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1",
        mirror_fen(START_FEN)?
    );

    assert_eq!(
        "rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 1",
        mirror_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")?
    );

    assert_eq!(
        "4k2r/8/8/8/8/8/8/R3K3 b Qk - 3 40",
        mirror_fen("r3k3/8/8/8/8/8/8/4K2R w Kq - 3 40")?
    );

    let kiwipete = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    assert_eq!(kiwipete, mirror_fen(&mirror_fen(kiwipete)?)?);

    assert!(mirror_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1").is_err());
    assert!(mirror_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());

    Ok(())
}
