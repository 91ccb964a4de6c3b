use std::fmt;

use clap::ValueEnum;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::board::{Board, CellColor, GameResult, Move, Piece, Side, Square, BLOCK_CELLS};
use crate::engine::{random_move, Engine};
use crate::error::{CheckersError, Result};
use crate::movegen::captures_from;
use crate::wire::WireMove;

/// How the computer side picks its moves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Uniformly random legal move.
    Easy,
    /// Minimax search.
    Hard,
    /// The computer side is a remote player behind the relay.
    Multiplayer,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Difficulty::Easy => f.write_str("easy"),
            Difficulty::Hard => f.write_str("hard"),
            Difficulty::Multiplayer => f.write_str("multiplayer"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnState {
    AwaitingSelection,
    PieceSelected { from: Square, destinations: Vec<Move> },
    /// A piece has just captured and must capture again before the turn passes.
    ContinuingCapture { piece: Square, captures: Vec<Move> },
    Decided(Side),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    Ignored,
    Selected { from: Square, destinations: Vec<Move> },
    Moved { move_: Move, continues: bool },
}

/// Game result as the local player sees it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Undecided,
    Won,
    Lost,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Idle,
    Selected,
    Destination,
}

#[derive(Clone, Debug, Serialize)]
pub struct CellView {
    pub row: usize,
    pub col: usize,
    pub color: CellColor,
    pub piece: Option<Piece>,
    pub status: CellStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub cells: Vec<CellView>,
    pub side_to_move: Side,
    pub result: Outcome,
    pub difficulty: Difficulty,
}

pub struct Game {
    board: Board,
    difficulty: Difficulty,
    state: TurnState,
    engine: Engine,
    rng: StdRng,
}

impl Game {
    pub fn new(difficulty: Difficulty, engine: Engine) -> Self {
        Self::from_board(Board::new(), difficulty, engine)
    }

    /// Starts a session on an arbitrary position; the turn state is derived from it.
    pub fn from_board(board: Board, difficulty: Difficulty, engine: Engine) -> Self {
        let mut game = Self {
            board,
            difficulty,
            state: TurnState::AwaitingSelection,
            engine,
            rng: StdRng::from_entropy(),
        };
        game.settle();
        game
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn is_decided(&self) -> bool {
        matches!(self.state, TurnState::Decided(_))
    }

    pub fn outcome(&self) -> Outcome {
        match self.board.result() {
            GameResult::Undecided => Outcome::Undecided,
            GameResult::Winner(side) if side == Side::PLAYER => Outcome::Won,
            GameResult::Winner(_) => Outcome::Lost,
        }
    }

    pub fn reset(&mut self) {
        self.reset_with_first_mover(Side::PLAYER);
    }

    pub fn reset_with_first_mover(&mut self, side: Side) {
        let mut board = Board::new();
        board.set_side_to_move(side);
        self.board = board;
        self.settle();
        info!("new game ({}), {} moves first", self.difficulty, side);
    }

    /// Drives the state machine from a click on the player's side of the board. Clicks
    /// that match no legal action leave everything as it was.
    pub fn apply_click(&mut self, col: usize, row: usize) -> ClickOutcome {
        let (Ok(row), Ok(col)) = (i32::try_from(row), i32::try_from(col)) else {
            return ClickOutcome::Ignored;
        };
        let Some(square) = Square::try_at(row, col) else {
            return ClickOutcome::Ignored;
        };
        if self.is_decided() || self.board.side_to_move() != Side::PLAYER {
            return ClickOutcome::Ignored;
        }

        let chosen = match &self.state {
            TurnState::ContinuingCapture { captures, .. } => {
                match captures.iter().find(|move_| move_.to == square) {
                    Some(move_) => *move_,
                    None => return ClickOutcome::Ignored,
                }
            }
            TurnState::PieceSelected { destinations, .. } if self.board.is_empty(square) => {
                match destinations.iter().find(|move_| move_.to == square) {
                    Some(move_) => *move_,
                    None => return ClickOutcome::Ignored,
                }
            }
            _ => return self.select(square),
        };

        let continues = self.commit(chosen);
        ClickOutcome::Moved { move_: chosen, continues }
    }

    fn select(&mut self, square: Square) -> ClickOutcome {
        match self.board.piece_at(square) {
            Some(piece) if piece.side == Side::PLAYER => {}
            _ => return ClickOutcome::Ignored,
        }
        let destinations: Vec<Move> = self.board.legal_moves()
            .into_iter()
            .filter(|move_| move_.from == square)
            .collect();
        if destinations.is_empty() {
            return ClickOutcome::Ignored;
        }
        debug!("selected {} with {} destinations", square, destinations.len());
        self.state = TurnState::PieceSelected { from: square, destinations: destinations.clone() };
        ClickOutcome::Selected { from: square, destinations }
    }

    /// Plays one computer move according to the difficulty. `None` when it is not the
    /// computer's turn, the game is over, or the computer side is a remote player.
    pub fn apply_computer_step(&mut self) -> Option<Move> {
        if self.is_decided() || self.board.side_to_move() != Side::COMPUTER {
            return None;
        }
        let chosen = match self.difficulty {
            Difficulty::Hard => self.engine.best_move(&self.board, Side::COMPUTER),
            Difficulty::Easy => random_move(&self.board, Side::COMPUTER, &mut self.rng),
            Difficulty::Multiplayer => {
                warn!("computer step requested in multiplayer mode; waiting for the peer instead");
                return None;
            }
        }?;
        self.commit(chosen);
        Some(chosen)
    }

    /// Computer moves until the turn comes back to the player or the game ends.
    pub fn run_computer_turn(&mut self) -> Vec<Move> {
        let mut played = Vec::new();
        while let Some(move_) = self.apply_computer_step() {
            played.push(move_);
        }
        played
    }

    /// Applies a move received from the relay, after mirroring it into our frame.
    pub fn apply_remote_move(&mut self, record: &WireMove) -> Result<Move> {
        if self.board.side_to_move() != Side::COMPUTER || self.is_decided() {
            return Err(CheckersError::OutOfTurn(Side::COMPUTER));
        }
        let move_ = record.to_mirrored_move();
        self.play(move_)?;
        Ok(move_)
    }

    /// Plays `move_` for the side to move if it is legal; returns whether the same piece
    /// must keep capturing.
    pub fn play(&mut self, move_: Move) -> Result<bool> {
        if !self.board.legal_moves().contains(&move_) {
            return Err(CheckersError::IllegalMove(move_));
        }
        Ok(self.commit(move_))
    }

    fn commit(&mut self, move_: Move) -> bool {
        let mover = self.board.side_to_move();
        self.board.apply_in_place(&move_);
        info!("{} plays {} (eval {})", mover, move_, self.engine.eval(&self.board));

        let follow_ups = if move_.is_capture() { captures_from(&self.board, move_.to) } else { Vec::new() };
        let continues = !follow_ups.is_empty();
        if continues {
            self.board.set_continuing_capture(Some(move_.to));
        } else {
            self.board.pass_turn();
        }
        self.settle();
        continues
    }

    /// Recomputes the turn state from the board, deciding the game when the side to move
    /// is out of moves.
    fn settle(&mut self) {
        if let GameResult::Winner(winner) = self.board.result() {
            self.state = TurnState::Decided(winner);
            return;
        }
        let moves = self.board.legal_moves();
        if moves.is_empty() {
            let winner = self.board.side_to_move().opposite();
            self.board.set_result(GameResult::Winner(winner));
            self.state = TurnState::Decided(winner);
            info!("{} has no moves left, {} wins\n{}", self.board.side_to_move(), winner, self.board);
            return;
        }
        self.state = match self.board.continuing_capture() {
            Some(piece) => TurnState::ContinuingCapture { piece, captures: moves },
            None => TurnState::AwaitingSelection,
        };
    }

    pub fn snapshot(&self) -> Snapshot {
        let (selected, destinations): (Option<Square>, &[Move]) = match &self.state {
            TurnState::PieceSelected { from, destinations } => (Some(*from), destinations),
            TurnState::ContinuingCapture { piece, captures } if self.board.side_to_move() == Side::PLAYER => {
                (Some(*piece), captures)
            }
            _ => (None, &[]),
        };
        let cells = (0..BLOCK_CELLS).map(|index| {
            let square = Square::from_index(index);
            let status = if selected == Some(square) {
                CellStatus::Selected
            } else if destinations.iter().any(|move_| move_.to == square) {
                CellStatus::Destination
            } else {
                CellStatus::Idle
            };
            CellView {
                row: square.row(),
                col: square.col(),
                color: square.color(),
                piece: self.board.piece_at(square),
                status,
            }
        }).collect();
        Snapshot {
            cells,
            side_to_move: self.board.side_to_move(),
            result: self.outcome(),
            difficulty: self.difficulty,
        }
    }
}
