//! Network infrastructure: the TCP server and the background reaper.

pub mod reaper;
pub mod server;

pub use reaper::{spawn_reaper, sweep, SweepReport};
pub use server::{run_server, serve};
