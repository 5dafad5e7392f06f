//! Domain entities for the Gomoku session server.
//!
//! Pure game rules with no infrastructure dependencies: nothing in here
//! touches a socket, a clock or a lock.
//!
//! Code in outer layers (the server's room and session types) depends on the
//! domain, but the domain never depends on them.

/// The board engine: grid, history, turn and terminal-state detection.
pub mod board;

/// Translation between board stones and protocol slots.
pub mod slot;
