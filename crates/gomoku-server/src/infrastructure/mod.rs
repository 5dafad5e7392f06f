//! Infrastructure layer: sockets, stdin and the configuration file.

pub mod console;
pub mod network;
pub mod storage;

pub use network::{run_server, serve, spawn_reaper};
