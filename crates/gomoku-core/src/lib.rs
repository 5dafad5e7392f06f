//! # gomoku-core
//!
//! Shared library for the Gomoku session server containing the board engine,
//! the stone/slot translation and the line-oriented protocol codec.
//!
//! This crate has zero dependencies on sockets, async runtimes or UI
//! frameworks, so everything in it can be unit-tested in isolation.
//!
//! # Architecture overview
//!
//! - **`domain`** – Pure game rules.  [`Board`] is a 15×15 grid with a move
//!   history, a turn indicator and an outcome derived from the stones on the
//!   board.  [`Slot`] is the room-scoped participant number used on the wire;
//!   the one and only translation between a [`Stone`] and a [`Slot`] lives in
//!   [`domain::slot`].
//!
//! - **`protocol`** – How commands and events travel over the network.  Every
//!   message is a single colon-delimited text line; [`ClientCommand`] and
//!   [`ServerMessage`] are the typed forms and the codec converts between
//!   them and text.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `gomoku_core::Board` instead of `gomoku_core::domain::board::Board`.
pub use domain::board::{Board, BoardError, Cell, Outcome, Point, Stone, BOARD_SIZE, WIN_LENGTH};
pub use domain::slot::{GameResult, Slot};
pub use protocol::codec::{
    decode_client_command, decode_server_message, encode_client_command, encode_server_message,
    validate_name, ProtocolError,
};
pub use protocol::messages::{ClientCommand, RoomId, RoomStatus, RoomSummary, ServerMessage};
