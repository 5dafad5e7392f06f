//! Room slots and their translation to board stones.
//!
//! The board thinks in stones (Black, White); the protocol thinks in slots
//! (1, 2).  The two numbering schemes meet only here:
//!
//! | Slot | Stone | Moves  |
//! |------|-------|--------|
//! | 1    | Black | first  |
//! | 2    | White | second |
//!
//! Every `MOVE`, `TURN` and `GAME_OVER` line the server emits goes through
//! [`Slot::from_stone`] or [`GameResult::from_outcome`].

use std::fmt;

use crate::domain::board::{Outcome, Stone};

/// A room-scoped participant number.  Slot 1 is the room creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    /// Both slots in order.
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    /// Wire number of the slot (`1` or `2`).
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    /// Parses a wire number; anything other than `1` or `2` is `None`.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Slot::One),
            2 => Some(Slot::Two),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    /// Zero-based position, for indexing two-element arrays.
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    /// Board stone played by this slot.
    pub fn stone(self) -> Stone {
        match self {
            Slot::One => Stone::Black,
            Slot::Two => Stone::White,
        }
    }

    /// Slot that plays `stone`.  Inverse of [`Slot::stone`].
    pub fn from_stone(stone: Stone) -> Self {
        match stone {
            Stone::Black => Slot::One,
            Stone::White => Slot::Two,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Result carried by a `GAME_OVER` line: a winning slot, or a draw (`0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameResult {
    Winner(Slot),
    Draw,
}

impl GameResult {
    /// Translates a terminal board outcome; `Ongoing` yields `None`.
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::Ongoing => None,
            Outcome::Won(stone) => Some(GameResult::Winner(Slot::from_stone(stone))),
            Outcome::Draw => Some(GameResult::Draw),
        }
    }

    /// Wire number: `0` for a draw, otherwise the winning slot.
    pub fn number(self) -> u8 {
        match self {
            GameResult::Winner(slot) => slot.number(),
            GameResult::Draw => 0,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(GameResult::Draw),
            n => Slot::from_number(n).map(GameResult::Winner),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
