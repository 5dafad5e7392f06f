//! # gomoku-server
//!
//! Multi-room session server for two-player Gomoku over a line-oriented TCP
//! protocol.
//!
//! # Architecture overview
//!
//! ```text
//! TCP client  (colon-delimited text lines)
//!       ↕
//! gomoku-server
//!   domain/          ServerConfig
//!   application/     Session, Room, Registry, command dispatch
//!   infrastructure/
//!     network/       accept loop, per-connection reader/writer, reaper
//!     console/       operator commands on stdin
//!     storage/       TOML configuration file
//! ```
//!
//! The binary (`main.rs`) wires these together: it parses the CLI, merges the
//! configuration file, initialises logging and runs [`infrastructure::run_server`]
//! until Ctrl+C or the console `quit` command clears the shared running flag.

pub mod application;
pub mod domain;
pub mod infrastructure;
