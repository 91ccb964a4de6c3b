use std::fmt;

use bitvec::{prelude::*, slice::IterOnes};
use log::error;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{CheckersError, Result};

pub const CELLS_PER_ROW: usize = 8;
pub const BLOCK_CELLS: usize = CELLS_PER_ROW * CELLS_PER_ROW;
pub const STONES_COUNT: usize = 12;
pub type BitBoard = BitArr!(for BLOCK_CELLS, in u64, Lsb0);
// one bit per cell, row-major from the top-left corner (row 0 is the dark back row)

pub trait BitArr2D {
    fn empty() -> Self;
    fn set_square(&mut self, square: Square, value: bool);
    fn has(&self, square: Square) -> bool;
    type IterSquares<'a>: Iterator<Item=Square> + 'a where Self: 'a;
    fn iter_squares(&'_ self) -> Self::IterSquares<'_>;
}

impl BitArr2D for BitBoard {
    fn empty() -> Self {
        bitarr!(u64, Lsb0; 0; BLOCK_CELLS)
    }

    fn set_square(&mut self, square: Square, value: bool) {
        self.set(square.index(), value);
    }

    fn has(&self, square: Square) -> bool {
        self[square.index()]
    }

    type IterSquares<'a> = std::iter::Map<IterOnes<'a, u64, Lsb0>, fn(usize) -> Square>;

    fn iter_squares(&'_ self) -> Self::IterSquares<'_> {
        self.iter_ones().map(Square::from_index)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub fn new(row: usize, col: usize) -> Self {
        assert!(row < CELLS_PER_ROW && col < CELLS_PER_ROW, "square ({}, {}) is off the board", row, col);
        Square((row * CELLS_PER_ROW + col) as u8)
    }

    /// The single bounds check every diagonal walk goes through.
    pub fn try_at(row: i32, col: i32) -> Option<Self> {
        let size = CELLS_PER_ROW as i32;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Some(Square((row * size + col) as u8))
        } else {
            None
        }
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Square(index as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn row(self) -> usize {
        self.index() / CELLS_PER_ROW
    }

    pub fn col(self) -> usize {
        self.index() % CELLS_PER_ROW
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> Option<Self> {
        Self::try_at(self.row() as i32 + d_row, self.col() as i32 + d_col)
    }

    pub fn is_playable(self) -> bool {
        (self.row() + self.col()) % 2 == 1
    }

    pub fn color(self) -> CellColor {
        if self.is_playable() { CellColor::Dark } else { CellColor::Light }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.row(), self.col())
    }
}

/// Fixed color class of a cell; only the renderer cares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellColor {
    Light,
    Dark,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Light,
    Dark,
}

impl Side {
    pub const PLAYER: Side = Side::Light;
    pub const COMPUTER: Side = Side::Dark;

    pub fn opposite(self) -> Self {
        match self {
            Side::Light => Side::Dark,
            Side::Dark => Side::Light,
        }
    }

    pub fn back_row(self) -> usize {
        match self {
            Side::Light => CELLS_PER_ROW - 1,
            Side::Dark => 0,
        }
    }

    pub fn promotion_row(self) -> usize {
        self.opposite().back_row()
    }

    /// Rows a piece of this side sitting on `row` has advanced from its own back row.
    pub fn rows_travelled(self, row: usize) -> usize {
        match self {
            Side::Light => CELLS_PER_ROW - 1 - row,
            Side::Dark => row,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Light => f.write_str("light"),
            Side::Dark => f.write_str("dark"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Man,
    King,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Piece {
    pub side: Side,
    pub rank: Rank,
}

impl Piece {
    pub fn man(side: Side) -> Self {
        Self { side, rank: Rank::Man }
    }

    pub fn king(side: Side) -> Self {
        Self { side, rank: Rank::King }
    }

    pub fn is_king(&self) -> bool {
        self.rank == Rank::King
    }

    fn symbol(&self) -> char {
        match (self.side, self.rank) {
            (Side::Light, Rank::Man) => 'o',
            (Side::Light, Rank::King) => 'O',
            (Side::Dark, Rank::Man) => 'x',
            (Side::Dark, Rank::King) => 'X',
        }
    }

    fn from_symbol(symbol: char) -> Option<Option<Self>> {
        match symbol {
            '.' => Some(None),
            'o' => Some(Some(Piece::man(Side::Light))),
            'O' => Some(Some(Piece::king(Side::Light))),
            'x' => Some(Some(Piece::man(Side::Dark))),
            'X' => Some(Some(Piece::king(Side::Dark))),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub captured: Option<Square>,
}

impl Move {
    pub fn step(from: Square, to: Square) -> Self {
        Self { from, to, captured: None }
    }

    pub fn capture(from: Square, over: Square, to: Square) -> Self {
        Self { from, to, captured: Some(over) }
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.captured {
            Some(over) => write!(f, "{}x{}->{}", self.from, over, self.to),
            None => write!(f, "{}->{}", self.from, self.to),
        }
    }
}

fn col_row(square: Square) -> [usize; 2] {
    [square.col(), square.row()]
}

impl Serialize for Move {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> where S: Serializer {
        let mut s = serializer.serialize_struct("Move", 3)?;
        s.serialize_field("from", &col_row(self.from))?;
        s.serialize_field("to", &col_row(self.to))?;
        s.serialize_field("captured", &self.captured.map(col_row))?;
        s.end()
    }
}

struct MoveVisitor;
impl<'de> Visitor<'de> for MoveVisitor {
    type Value = Move;
    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object for Move")
    }
    fn visit_map<V>(self, mut map: V) -> std::result::Result<Move, V::Error> where V: MapAccess<'de> {
        let mut from = None;
        let mut to = None;
        let mut captured = None;
        while let Some(key) = map.next_key::<String>()? {
            let field = match key.as_str() {
                "from" => &mut from,
                "to" => &mut to,
                "captured" => &mut captured,
                _ => { return Err(serde::de::Error::unknown_field(&key, &["from", "to", "captured"])); }
            };
            if let Some([col, row]) = map.next_value::<Option<[i32; 2]>>()? {
                let square = Square::try_at(row, col).ok_or_else(
                    || serde::de::Error::custom(format!("square [{}, {}] is off the board", col, row))
                )?;
                *field = Some(square);
            }
        }
        let from = from.ok_or_else(|| serde::de::Error::missing_field("from"))?;
        let to = to.ok_or_else(|| serde::de::Error::missing_field("to"))?;
        Ok(Move { from, to, captured })
    }
}

impl<'de> Deserialize<'de> for Move {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error> where D: Deserializer<'de> {
        deserializer.deserialize_map(MoveVisitor)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GameResult {
    #[default]
    Undecided,
    Winner(Side),
}

impl GameResult {
    pub fn is_decided(&self) -> bool {
        matches!(self, GameResult::Winner(_))
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Board {
    light_squares: BitBoard,
    dark_squares: BitBoard,
    king_squares: BitBoard,
    side_to_move: Side,
    result: GameResult,
    continuing_capture: Option<Square>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Standard opening: twelve men per side on the playable cells of the three rows
    /// nearest each player, light to move.
    pub fn new() -> Self {
        let mut board = Self::empty(Side::PLAYER);
        for index in 0..BLOCK_CELLS {
            let square = Square::from_index(index);
            if !square.is_playable() {
                continue;
            }
            if square.row() < 3 {
                board.place(square, Piece::man(Side::Dark));
            } else if square.row() >= CELLS_PER_ROW - 3 {
                board.place(square, Piece::man(Side::Light));
            }
        }
        board
    }

    pub fn empty(side_to_move: Side) -> Self {
        Self {
            light_squares: BitBoard::empty(),
            dark_squares: BitBoard::empty(),
            king_squares: BitBoard::empty(),
            side_to_move,
            result: GameResult::Undecided,
            continuing_capture: None,
        }
    }

    /// Parses eight rows of eight cells, top row first: `.` empty, `o`/`O` light man/king,
    /// `x`/`X` dark man/king. Whitespace inside a row is ignored.
    pub fn from_diagram(diagram: &str, side_to_move: Side) -> Result<Self> {
        let rows: Vec<Vec<char>> = diagram.lines()
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect::<Vec<char>>())
            .filter(|row| !row.is_empty())
            .collect();
        if rows.len() != CELLS_PER_ROW {
            return Err(CheckersError::InvalidBoard(format!("expected {} rows, found {}", CELLS_PER_ROW, rows.len())));
        }

        let mut board = Self::empty(side_to_move);
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != CELLS_PER_ROW {
                return Err(CheckersError::InvalidBoard(
                    format!("row {} has {} cells, expected {}", row, cells.len(), CELLS_PER_ROW)
                ));
            }
            for (col, symbol) in cells.iter().enumerate() {
                let cell = Piece::from_symbol(*symbol).ok_or_else(
                    || CheckersError::InvalidBoard(format!("unknown cell symbol '{}' at ({},{})", symbol, row, col))
                )?;
                if let Some(piece) = cell {
                    board.place(Square::new(row, col), piece);
                }
            }
        }
        board.check_invariants()?;
        Ok(board)
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn set_side_to_move(&mut self, side: Side) {
        self.side_to_move = side;
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub(crate) fn set_result(&mut self, result: GameResult) {
        self.result = result;
    }

    /// The piece that has just captured and must keep capturing, if any.
    pub fn continuing_capture(&self) -> Option<Square> {
        self.continuing_capture
    }

    pub(crate) fn set_continuing_capture(&mut self, square: Option<Square>) {
        self.continuing_capture = square;
    }

    pub(crate) fn pass_turn(&mut self) {
        self.side_to_move = self.side_to_move.opposite();
        self.continuing_capture = None;
    }

    fn squares_of(&self, side: Side) -> &BitBoard {
        match side {
            Side::Light => &self.light_squares,
            Side::Dark => &self.dark_squares,
        }
    }

    pub fn occupied_squares(&self) -> BitBoard {
        self.light_squares | self.dark_squares
    }

    pub fn empty_squares(&self) -> BitBoard {
        !self.occupied_squares()
    }

    pub fn is_empty(&self, square: Square) -> bool {
        !self.light_squares.has(square) && !self.dark_squares.has(square)
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        let side = if self.light_squares.has(square) {
            Side::Light
        } else if self.dark_squares.has(square) {
            Side::Dark
        } else {
            return None;
        };
        let rank = if self.king_squares.has(square) { Rank::King } else { Rank::Man };
        Some(Piece { side, rank })
    }

    pub fn pieces(&self, side: Side) -> impl Iterator<Item=(Square, Piece)> + '_ {
        let kings = &self.king_squares;
        self.squares_of(side).iter_squares().map(move |square| {
            let rank = if kings.has(square) { Rank::King } else { Rank::Man };
            (square, Piece { side, rank })
        })
    }

    pub fn count(&self, side: Side) -> usize {
        self.squares_of(side).count_ones()
    }

    pub fn count_kings(&self, side: Side) -> usize {
        (*self.squares_of(side) & self.king_squares).count_ones()
    }

    /// Puts `piece` on `square`, replacing whatever was there.
    pub fn place(&mut self, square: Square, piece: Piece) {
        self.light_squares.set_square(square, piece.side == Side::Light);
        self.dark_squares.set_square(square, piece.side == Side::Dark);
        self.king_squares.set_square(square, piece.is_king());
    }

    pub fn remove(&mut self, square: Square) -> Option<Piece> {
        let piece = self.piece_at(square)?;
        self.light_squares.set_square(square, false);
        self.dark_squares.set_square(square, false);
        self.king_squares.set_square(square, false);
        Some(piece)
    }

    /// Relocates the moving piece, drops the captured one and crowns a man that reaches
    /// its promotion row. Legality is the caller's business. Turn bookkeeping is untouched.
    pub fn apply_move(&self, move_: &Move) -> Board {
        let mut board = self.clone();
        board.apply_in_place(move_);
        board
    }

    pub fn apply_in_place(&mut self, move_: &Move) {
        let Some(mut piece) = self.remove(move_.from) else {
            error!("no piece to move on {} for {}", move_.from, move_);
            return;
        };
        if let Some(captured) = move_.captured {
            self.remove(captured);
        }
        if move_.to.row() == piece.side.promotion_row() {
            piece.rank = Rank::King;
        }
        self.place(move_.to, piece);
    }

    /// Board after `mover` plays `move_`, with the turn handed straight to the opponent.
    pub fn successor(&self, move_: &Move, mover: Side) -> Board {
        let mut board = self.apply_move(move_);
        board.side_to_move = mover.opposite();
        board.continuing_capture = None;
        board
    }

    pub fn check_invariants(&self) -> Result<()> {
        if (self.light_squares & self.dark_squares).any() {
            return Err(CheckersError::InvalidBoard("a cell is claimed by both sides".into()));
        }
        if (self.king_squares & self.empty_squares()).any() {
            return Err(CheckersError::InvalidBoard("a king marker sits on an empty cell".into()));
        }
        for side in [Side::Light, Side::Dark] {
            if self.count(side) > STONES_COUNT {
                return Err(CheckersError::InvalidBoard(format!("{} has more than {} pieces", side, STONES_COUNT)));
            }
            if let Some((square, _)) = self.pieces(side)
                .find(|(square, piece)| !piece.is_king() && square.row() == side.promotion_row()) {
                return Err(CheckersError::InvalidBoard(format!("{} man on {} should have been crowned", side, square)));
            }
        }
        if let Some(square) = self.continuing_capture {
            if self.piece_at(square).map(|piece| piece.side) != Some(self.side_to_move) {
                return Err(CheckersError::InvalidBoard(
                    format!("capturing piece on {} does not belong to {}", square, self.side_to_move)
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in 0..CELLS_PER_ROW {
            for col in 0..CELLS_PER_ROW {
                let symbol = self.piece_at(Square::new(row, col)).map_or('.', |piece| piece.symbol());
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
