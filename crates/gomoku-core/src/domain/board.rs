//! Board engine: a fixed 15×15 Gomoku board.
//!
//! The board is a pure state machine.  It owns the grid, the ordered move
//! history and the turn indicator, and it knows when the game is over:
//!
//! ```text
//! Empty ──place──► Ongoing ──place──► … ──► Won(stone) | Draw
//!                     ▲                          │
//!                     └─────────── undo ─────────┘
//! ```
//!
//! Coordinates are 1-indexed on both axes: `(1, 1)` is the top-left
//! intersection and `(15, 15)` the bottom-right one.
//!
//! # Win detection
//!
//! A win can only be created by the stone that was just placed, so the check
//! runs once per placement, for the mover only, centred on the new stone.
//! Each of the four axes is scanned over a 9-cell window (4 cells either
//! side).  Any run of five through the new stone lies entirely inside that
//! window, wherever the new stone sits within the run, so the check is O(1).
//!
//! # Outcome
//!
//! The outcome is never set by hand.  It is recomputed from the stones
//! whenever the board changes: incrementally after a placement, and by a full
//! scan after an undo.

use std::fmt;

use thiserror::Error;
use tracing::trace;

/// Number of intersections along each side of the board.
pub const BOARD_SIZE: u8 = 15;

/// Length of the run that wins the game.
pub const WIN_LENGTH: usize = 5;

/// Cells scanned on each side of the placed stone during win detection.
const WINDOW_HALF: i32 = WIN_LENGTH as i32 - 1;

const CELL_COUNT: usize = BOARD_SIZE as usize * BOARD_SIZE as usize;

/// Horizontal, vertical, main diagonal, anti-diagonal.
const AXES: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// Star points drawn by the text rendering.
const STAR_POINTS: [(u8, u8); 5] = [(4, 4), (4, 12), (8, 8), (12, 4), (12, 12)];

// ── Basic types ───────────────────────────────────────────────────────────────

/// Stone colour; the board's internal owner identity.
///
/// Black always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stone {
    Black,
    White,
}

impl Stone {
    /// Returns the other colour.
    pub fn opponent(self) -> Self {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }
}

/// Content of a single intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    Occupied(Stone),
}

/// A 1-indexed board coordinate that is known to be on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u8,
    pub y: u8,
}

impl Point {
    /// Validates a raw coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::OutOfBounds`] when either coordinate falls
    /// outside `1..=BOARD_SIZE`.
    pub fn new(x: i32, y: i32) -> Result<Self, BoardError> {
        if in_bounds(x, y) {
            Ok(Self {
                x: x as u8,
                y: y as u8,
            })
        } else {
            Err(BoardError::OutOfBounds { x, y })
        }
    }

    fn index(self) -> usize {
        (self.y as usize - 1) * BOARD_SIZE as usize + (self.x as usize - 1)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Terminal state of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Moves are still being accepted.
    Ongoing,
    /// The given stone completed a run of [`WIN_LENGTH`] or more.
    Won(Stone),
    /// Every cell is occupied and nobody has a run.
    Draw,
}

impl Outcome {
    /// Returns `true` for `Won` and `Draw`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Ongoing)
    }
}

/// Reasons a board operation can be refused.  A refused operation never
/// changes the board.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("coordinate ({x}, {y}) is off the board")]
    OutOfBounds { x: i32, y: i32 },

    #[error("cell ({x}, {y}) is already occupied")]
    Occupied { x: u8, y: u8 },

    #[error("the game is already over")]
    GameOver,

    #[error("there is no move to undo")]
    NoHistory,
}

fn in_bounds(x: i32, y: i32) -> bool {
    (1..=BOARD_SIZE as i32).contains(&x) && (1..=BOARD_SIZE as i32).contains(&y)
}

// ── Board ─────────────────────────────────────────────────────────────────────

/// A 15×15 Gomoku board.
///
/// # Examples
///
/// ```rust
/// use gomoku_core::{Board, Outcome, Stone};
///
/// let mut board = Board::new();
/// for x in 4..=7 {
///     board.place_stone(x, 4).unwrap(); // black
///     board.place_stone(x, 10).unwrap(); // white
/// }
/// board.place_stone(8, 4).unwrap();
/// assert_eq!(board.outcome(), Outcome::Won(Stone::Black));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; CELL_COUNT],
    to_move: Stone,
    history: Vec<Point>,
    empty_count: usize,
    outcome: Outcome,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Creates an empty board with Black to move.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; CELL_COUNT],
            to_move: Stone::Black,
            history: Vec::with_capacity(CELL_COUNT),
            empty_count: CELL_COUNT,
            outcome: Outcome::Ongoing,
        }
    }

    /// Rebuilds a board by replaying `moves` from an empty position.
    ///
    /// # Errors
    ///
    /// Returns the first [`BoardError`] hit while replaying.
    pub fn from_moves<I>(moves: I) -> Result<Self, BoardError>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut board = Self::new();
        for (x, y) in moves {
            board.place_stone(x, y)?;
        }
        Ok(board)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Returns the content of `(x, y)`, or `None` when off the board.
    pub fn cell(&self, x: i32, y: i32) -> Option<Cell> {
        Point::new(x, y).ok().map(|p| self.cells[p.index()])
    }

    /// Returns the stone at `(x, y)`, if any.
    pub fn stone_at(&self, x: i32, y: i32) -> Option<Stone> {
        match self.cell(x, y)? {
            Cell::Occupied(stone) => Some(stone),
            Cell::Empty => None,
        }
    }

    /// Stone whose turn it is.
    pub fn to_move(&self) -> Stone {
        self.to_move
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Placed coordinates, oldest first.
    pub fn history(&self) -> &[Point] {
        &self.history
    }

    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }

    /// Most recent placement, if any.
    pub fn last_move(&self) -> Option<Point> {
        self.history.last().copied()
    }

    pub fn empty_count(&self) -> usize {
        self.empty_count
    }

    pub fn occupied_count(&self) -> usize {
        CELL_COUNT - self.empty_count
    }

    /// Every empty coordinate in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Point> + '_ {
        (1..=BOARD_SIZE).flat_map(move |y| {
            (1..=BOARD_SIZE).filter_map(move |x| {
                let p = Point { x, y };
                (self.cells[p.index()] == Cell::Empty).then_some(p)
            })
        })
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Places a stone for the side to move at `(x, y)`.
    ///
    /// On success the outcome is updated and, if the game continues, the turn
    /// passes to the opponent.  Returns the validated coordinate.
    ///
    /// # Errors
    ///
    /// - [`BoardError::GameOver`] if the outcome is already terminal.
    /// - [`BoardError::OutOfBounds`] if the coordinate is off the board.
    /// - [`BoardError::Occupied`] if the cell already holds a stone.
    pub fn place_stone(&mut self, x: i32, y: i32) -> Result<Point, BoardError> {
        if self.outcome.is_terminal() {
            return Err(BoardError::GameOver);
        }
        let point = Point::new(x, y)?;
        if self.cells[point.index()] != Cell::Empty {
            return Err(BoardError::Occupied {
                x: point.x,
                y: point.y,
            });
        }

        let mover = self.to_move;
        self.cells[point.index()] = Cell::Occupied(mover);
        self.history.push(point);
        self.empty_count -= 1;

        if self.completes_run(point, mover) {
            trace!(%point, ?mover, "placement completes a winning run");
            self.outcome = Outcome::Won(mover);
        } else if self.empty_count == 0 {
            self.outcome = Outcome::Draw;
        } else {
            self.to_move = mover.opponent();
        }
        Ok(point)
    }

    /// Takes back the most recent placement.
    ///
    /// The turn returns to the stone that made the move and the outcome is
    /// re-derived from the remaining stones.  Returns the cleared coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NoHistory`] on an empty history.
    pub fn undo(&mut self) -> Result<Point, BoardError> {
        let point = self.history.pop().ok_or(BoardError::NoHistory)?;
        let Cell::Occupied(mover) = self.cells[point.index()] else {
            unreachable!("history entry {point} points at an empty cell");
        };
        self.cells[point.index()] = Cell::Empty;
        self.empty_count += 1;
        self.to_move = mover;
        self.outcome = self.scan_outcome();
        Ok(point)
    }

    // ── Win detection ─────────────────────────────────────────────────────────

    /// Windowed check: does `stone` at `center` sit on a run of
    /// [`WIN_LENGTH`]?
    fn completes_run(&self, center: Point, stone: Stone) -> bool {
        let (cx, cy) = (center.x as i32, center.y as i32);
        for (dx, dy) in AXES {
            let mut consecutive = 0;
            for step in -WINDOW_HALF..=WINDOW_HALF {
                let (x, y) = (cx + dx * step, cy + dy * step);
                if !in_bounds(x, y) {
                    continue;
                }
                if self.cells[Point { x: x as u8, y: y as u8 }.index()] == Cell::Occupied(stone) {
                    consecutive += 1;
                    if consecutive >= WIN_LENGTH {
                        return true;
                    }
                } else {
                    consecutive = 0;
                }
            }
        }
        false
    }

    /// Full-board derivation of the outcome.
    fn scan_outcome(&self) -> Outcome {
        for point in self.history.iter().copied() {
            if let Cell::Occupied(stone) = self.cells[point.index()] {
                if self.completes_run(point, stone) {
                    return Outcome::Won(stone);
                }
            }
        }
        if self.empty_count == 0 {
            Outcome::Draw
        } else {
            Outcome::Ongoing
        }
    }
}

impl fmt::Display for Board {
    /// Renders the grid with column numbers on top and row numbers on the
    /// left.  `●` is black, `○` is white, `+` marks an empty star point.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        for x in 1..=BOARD_SIZE {
            write!(f, "{x:3}")?;
        }
        writeln!(f)?;
        for y in 1..=BOARD_SIZE {
            write!(f, "{y:2}")?;
            for x in 1..=BOARD_SIZE {
                let symbol = match self.cells[Point { x, y }.index()] {
                    Cell::Occupied(Stone::Black) => '●',
                    Cell::Occupied(Stone::White) => '○',
                    Cell::Empty if STAR_POINTS.contains(&(x, y)) => '+',
                    Cell::Empty => '.',
                };
                write!(f, "  {symbol}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
