//! Per-connection session state and the outbound message seam.
//!
//! A [`Session`] is the server-side handle for one client connection.  It
//! owns the display name, the binding to at most one room and a
//! [`MessageSink`] that carries outbound lines towards the socket.
//!
//! Sends are best-effort: [`Session::send`] never blocks and never fails the
//! caller.  A full or closed queue drops the message and logs it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use gomoku_core::{RoomId, ServerMessage, Slot};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::room::Room;

/// Process-unique identifier of a connection.
pub type SessionId = u64;

/// Shared handle to a room; the room lock serialises every room operation.
pub type RoomHandle = Arc<tokio::sync::Mutex<Room>>;

// ── Outbound seam ─────────────────────────────────────────────────────────────

/// Why an outbound message was not queued.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound queue is closed")]
    Closed,
}

/// Destination for a session's outbound messages.
///
/// The network layer backs this with a bounded channel drained by a writer
/// task; tests substitute a mock or a bare channel.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink: Send + Sync {
    /// Queues `msg` without waiting.
    fn deliver(&self, msg: ServerMessage) -> Result<(), SinkError>;

    /// Stops accepting messages.  Already-queued messages are still flushed.
    fn close(&self);
}

/// [`MessageSink`] over a bounded tokio channel.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<ServerMessage>>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Creates a sink plus the receiving end a writer task should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl MessageSink for ChannelSink {
    fn deliver(&self, msg: ServerMessage) -> Result<(), SinkError> {
        let guard = lock(&self.tx);
        let Some(tx) = guard.as_ref() else {
            return Err(SinkError::Closed);
        };
        tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn close(&self) {
        lock(&self.tx).take();
    }
}

// ── Room binding ──────────────────────────────────────────────────────────────

/// The room a session currently occupies and the slot it holds there.
#[derive(Debug, Clone)]
pub struct Binding {
    pub room_id: RoomId,
    pub slot: Slot,
    room: Weak<tokio::sync::Mutex<Room>>,
}

impl Binding {
    pub fn new(room_id: RoomId, slot: Slot, room: Weak<tokio::sync::Mutex<Room>>) -> Self {
        Self {
            room_id,
            slot,
            room,
        }
    }

    /// The bound room, unless it has already been dropped by the registry.
    pub fn room(&self) -> Option<RoomHandle> {
        self.room.upgrade()
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Server-side state of one client connection.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    connected_at: Instant,
    name: Mutex<Option<String>>,
    binding: Mutex<Option<Binding>>,
    last_activity: Mutex<Instant>,
    alive: AtomicBool,
    sink: Box<dyn MessageSink>,
}

impl Session {
    pub fn new(id: SessionId, peer: SocketAddr, sink: Box<dyn MessageSink>) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer,
            connected_at: now,
            name: Mutex::new(None),
            binding: Mutex::new(None),
            last_activity: Mutex::new(now),
            alive: AtomicBool::new(true),
            sink,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Name shown to other players.
    ///
    /// A name set with `SET_NAME` wins; otherwise `Player<slot>` while bound
    /// to a room and `Guest<id>` while not.
    pub fn display_name(&self) -> String {
        if let Some(name) = lock(&self.name).as_ref() {
            return name.clone();
        }
        match self.slot() {
            Some(slot) => format!("Player{slot}"),
            None => format!("Guest{}", self.id),
        }
    }

    /// Stores an already-validated display name.
    pub fn set_name(&self, name: String) {
        debug!(session = self.id, %name, "display name set");
        *lock(&self.name) = Some(name);
    }

    // ── Binding ───────────────────────────────────────────────────────────────

    pub fn binding(&self) -> Option<Binding> {
        lock(&self.binding).clone()
    }

    pub fn slot(&self) -> Option<Slot> {
        lock(&self.binding).as_ref().map(|b| b.slot)
    }

    pub fn room_id(&self) -> Option<RoomId> {
        lock(&self.binding).as_ref().map(|b| b.room_id)
    }

    /// The bound room, if any and still alive.
    pub fn room(&self) -> Option<RoomHandle> {
        lock(&self.binding).as_ref().and_then(Binding::room)
    }

    /// Binds the session to a room, replacing any previous binding.
    pub fn bind(&self, binding: Binding) {
        *lock(&self.binding) = Some(binding);
    }

    /// Clears the binding if it still points at `room_id`.  Returns whether
    /// it did.
    pub fn unbind_from(&self, room_id: RoomId) -> bool {
        let mut binding = lock(&self.binding);
        if binding.as_ref().is_some_and(|b| b.room_id == room_id) {
            *binding = None;
            true
        } else {
            false
        }
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    /// Queues `msg` for this client.  Returns whether it was accepted.
    pub fn send(&self, msg: ServerMessage) -> bool {
        if !self.is_alive() {
            debug!(session = self.id, keyword = msg.keyword(), "send to closed session skipped");
            return false;
        }
        let keyword = msg.keyword();
        match self.sink.deliver(msg) {
            Ok(()) => true,
            Err(SinkError::Full) => {
                warn!(session = self.id, keyword, "outbound queue full; message dropped");
                false
            }
            Err(SinkError::Closed) => {
                debug!(session = self.id, keyword, "outbound queue closed; message dropped");
                false
            }
        }
    }

    // ── Liveness ──────────────────────────────────────────────────────────────

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the connection closed and stops its outbound queue.
    pub fn mark_dead(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            self.sink.close();
        }
    }

    /// Records inbound activity.
    pub fn touch(&self) {
        *lock(&self.last_activity) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        lock(&self.last_activity).elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("room", &self.room_id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Locks a std mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn channel_session(id: SessionId) -> (Session, mpsc::Receiver<ServerMessage>) {
        let (sink, rx) = ChannelSink::channel(4);
        (Session::new(id, peer(), Box::new(sink)), rx)
    }

    #[test]
    fn test_unbound_session_is_named_guest() {
        let (session, _rx) = channel_session(7);
        assert_eq!(session.display_name(), "Guest7");
    }

    #[test]
    fn test_bound_session_is_named_after_slot() {
        let (session, _rx) = channel_session(7);
        session.bind(Binding::new(1, Slot::Two, Weak::new()));
        assert_eq!(session.display_name(), "Player2");
    }

    #[test]
    fn test_custom_name_overrides_default() {
        let (session, _rx) = channel_session(7);
        session.bind(Binding::new(1, Slot::One, Weak::new()));
        session.set_name("alice".to_string());
        assert_eq!(session.display_name(), "alice");
    }

    #[test]
    fn test_unbind_from_only_clears_matching_room() {
        let (session, _rx) = channel_session(1);
        session.bind(Binding::new(5, Slot::One, Weak::new()));

        assert!(!session.unbind_from(4));
        assert_eq!(session.room_id(), Some(5));

        assert!(session.unbind_from(5));
        assert_eq!(session.room_id(), None);
    }

    #[test]
    fn test_send_queues_message() {
        let (session, mut rx) = channel_session(1);

        assert!(session.send(ServerMessage::Turn { slot: Slot::One }));

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Turn { slot: Slot::One });
    }

    #[test]
    fn test_send_to_full_queue_drops_without_blocking() {
        let (sink, mut rx) = ChannelSink::channel(1);
        let session = Session::new(1, peer(), Box::new(sink));

        assert!(session.send(ServerMessage::GameStart { room_id: 1 }));
        assert!(!session.send(ServerMessage::GameStart { room_id: 2 }));

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::GameStart { room_id: 1 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_mark_dead_closes_sink_once() {
        let mut sink = MockMessageSink::new();
        sink.expect_close().times(1).return_const(());
        sink.expect_deliver().never();
        let session = Session::new(1, peer(), Box::new(sink));

        session.mark_dead();
        session.mark_dead();

        assert!(!session.is_alive());
        assert!(!session.send(ServerMessage::Turn { slot: Slot::Two }));
    }

    #[test]
    fn test_send_reports_sink_failure() {
        let mut sink = MockMessageSink::new();
        sink.expect_deliver()
            .times(1)
            .returning(|_| Err(SinkError::Closed));
        let session = Session::new(1, peer(), Box::new(sink));

        assert!(!session.send(ServerMessage::Turn { slot: Slot::Two }));
        // A failed delivery does not by itself mark the session dead.
        assert!(session.is_alive());
    }

    #[test]
    fn test_closed_channel_sink_rejects_delivery() {
        let (sink, _rx) = ChannelSink::channel(4);
        sink.close();
        assert_eq!(
            sink.deliver(ServerMessage::Turn { slot: Slot::One }),
            Err(SinkError::Closed)
        );
    }

    #[test]
    fn test_touch_resets_idle_time() {
        let (session, _rx) = channel_session(1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(session.idle_for() >= Duration::from_millis(20));
        session.touch();
        assert!(session.idle_for() < Duration::from_millis(20));
    }
}
