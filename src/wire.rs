//! Text records exchanged with the two-player relay.
//!
//! A local move goes out as `#turn,oldCol,oldRow,newCol,newRow,attack,attackCol,attackRow.`
//! where `turn` is who moves next from the sender's seat (0 = sender, 1 = peer). The relay
//! forwards the seven move fields without the `#turn,` header. Coordinates are always in
//! the sender's own frame, so a received record is mirrored before it touches our board.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::board::{Move, Side, Square, BLOCK_CELLS, CELLS_PER_ROW};

pub const TERMINATOR: char = '.';
pub const HEADER: char = '#';
pub const REQUEST_TURN: &str = "turn.";
pub const REQUEST_STEP: &str = "step.";
pub const DEFAULT_RELAY: &str = "127.0.0.1:54433";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("record is not terminated by '{}'", TERMINATOR)]
    MissingTerminator,
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("field {index} is not a number: {value:?}")]
    NotANumber { index: usize, value: String },
    #[error("field {index} is out of range: {value}")]
    OutOfRange { index: usize, value: u32 },
    #[error("capture record without a jumped cell between {from} and {to}")]
    BadCapture { from: Square, to: Square },
}

/// The square as seen from the opposite side of the table: a half turn, which mirrors
/// row and column together.
pub fn mirror(square: Square) -> Square {
    Square::from_index(BLOCK_CELLS - 1 - square.index())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WireMove {
    /// Who moves next from the sender's seat; absent on relayed records.
    next: Option<Seat>,
    old_col: usize,
    old_row: usize,
    new_col: usize,
    new_row: usize,
    attack: bool,
    attack_col: usize,
    attack_row: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Seat {
    Sender,
    Peer,
}

impl Seat {
    fn code(self) -> u32 {
        match self {
            Seat::Sender => 0,
            Seat::Peer => 1,
        }
    }

    /// Relay reply to `turn.`: `0` means we move, `1` means the peer does.
    pub fn parse_turn_reply(reply: &str) -> Result<Side, WireError> {
        let body = reply.trim().strip_suffix(TERMINATOR).unwrap_or(reply.trim());
        match body {
            "0" => Ok(Side::PLAYER),
            "1" => Ok(Side::COMPUTER),
            _ => match body.parse::<u32>() {
                Ok(value) => Err(WireError::OutOfRange { index: 0, value }),
                Err(_) => Err(WireError::NotANumber { index: 0, value: body.to_string() }),
            },
        }
    }
}

impl WireMove {
    /// Record for a move we just played; `next` is the side to move afterwards.
    pub fn from_local(move_: &Move, next: Side) -> Self {
        let (attack_col, attack_row) = move_.captured.map_or((0, 0), |over| (over.col(), over.row()));
        Self {
            next: Some(if next == Side::PLAYER { Seat::Sender } else { Seat::Peer }),
            old_col: move_.from.col(),
            old_row: move_.from.row(),
            new_col: move_.to.col(),
            new_row: move_.to.row(),
            attack: move_.is_capture(),
            attack_col,
            attack_row,
        }
    }

    /// The move in the sender's frame.
    pub fn to_move(&self) -> Move {
        let from = Square::new(self.old_row, self.old_col);
        let to = Square::new(self.new_row, self.new_col);
        let captured = self.attack.then(|| Square::new(self.attack_row, self.attack_col));
        Move { from, to, captured }
    }

    /// The move as it appears on the receiver's side of the table.
    pub fn to_mirrored_move(&self) -> Move {
        let move_ = self.to_move();
        Move {
            from: mirror(move_.from),
            to: mirror(move_.to),
            captured: move_.captured.map(mirror),
        }
    }

    /// Builds a record from its seven move fields, in wire order, with the same checks
    /// as parsing.
    pub fn new(next: Option<Seat>, fields: [u32; 7]) -> Result<Self, WireError> {
        Self::from_fields(next, &fields)
    }

    pub fn next(&self) -> Option<Seat> {
        self.next
    }

    fn from_fields(next: Option<Seat>, fields: &[u32]) -> Result<Self, WireError> {
        let offset = usize::from(next.is_some());
        let coordinate = |i: usize| -> Result<usize, WireError> {
            let value = fields[i];
            if (value as usize) < CELLS_PER_ROW {
                Ok(value as usize)
            } else {
                Err(WireError::OutOfRange { index: i + offset, value })
            }
        };
        let attack = match fields[4] {
            0 => false,
            1 => true,
            value => return Err(WireError::OutOfRange { index: 4 + offset, value }),
        };
        let record = Self {
            next,
            old_col: coordinate(0)?,
            old_row: coordinate(1)?,
            new_col: coordinate(2)?,
            new_row: coordinate(3)?,
            attack,
            attack_col: coordinate(5)?,
            attack_row: coordinate(6)?,
        };
        if record.attack {
            let move_ = record.to_move();
            let between = Square::try_at(
                (move_.from.row() + move_.to.row()) as i32 / 2,
                (move_.from.col() + move_.to.col()) as i32 / 2,
            );
            let jumped = move_.from.row().abs_diff(move_.to.row()) == 2 && move_.from.col().abs_diff(move_.to.col()) == 2;
            if !jumped || between != move_.captured {
                return Err(WireError::BadCapture { from: move_.from, to: move_.to });
            }
        }
        Ok(record)
    }
}

impl fmt::Display for WireMove {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(next) = self.next {
            write!(f, "{}{},", HEADER, next.code())?;
        }
        write!(
            f, "{},{},{},{},{},{},{}{}",
            self.old_col, self.old_row, self.new_col, self.new_row,
            u8::from(self.attack), self.attack_col, self.attack_row, TERMINATOR,
        )
    }
}

impl FromStr for WireMove {
    type Err = WireError;

    fn from_str(record: &str) -> Result<Self, Self::Err> {
        let body = record.trim().strip_suffix(TERMINATOR).ok_or(WireError::MissingTerminator)?;
        let (headed, body) = match body.strip_prefix(HEADER) {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let fields = body.split(',')
            .enumerate()
            .map(|(index, value)| value.trim().parse::<u32>()
                .map_err(|_| WireError::NotANumber { index, value: value.to_string() }))
            .collect::<Result<Vec<u32>, WireError>>()?;

        let expected = if headed { 8 } else { 7 };
        if fields.len() != expected {
            return Err(WireError::FieldCount { expected, found: fields.len() });
        }
        if headed {
            let next = match fields[0] {
                0 => Seat::Sender,
                1 => Seat::Peer,
                value => return Err(WireError::OutOfRange { index: 0, value }),
            };
            Self::from_fields(Some(next), &fields[1..])
        } else {
            Self::from_fields(None, &fields)
        }
    }
}
