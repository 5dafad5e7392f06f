//! Application layer: sessions, rooms, the registry and command dispatch.
//!
//! Everything here is transport-agnostic.  Outbound traffic leaves through
//! the [`session::MessageSink`] seam, so the whole layer runs in tests
//! without a socket.

pub mod dispatch;
pub mod registry;
pub mod room;
pub mod session;

pub use dispatch::{handle_command, handle_line};
pub use registry::Registry;
pub use room::{JoinError, MoveRejection, Room};
pub use session::{Binding, ChannelSink, MessageSink, RoomHandle, Session, SessionId, SinkError};
