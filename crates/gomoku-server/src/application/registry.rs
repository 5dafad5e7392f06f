//! Registry: the directory of live sessions and rooms.
//!
//! The registry is constructed once in `main.rs`, wrapped in an `Arc` and
//! handed to every connection task, the reaper and the operator console.
//!
//! # Locking
//!
//! The id→room map and the session set each sit behind a
//! `tokio::sync::RwLock`.  Room state sits behind each room's own mutex.
//! Lock order is always map first, then room; no room operation touches the
//! registry, and the departure path releases the room lock before it takes
//! the map lock to reclaim an emptied room.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gomoku_core::{RoomId, RoomSummary, ServerMessage, Slot};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::room::{JoinError, Room};
use crate::application::session::{Binding, RoomHandle, Session, SessionId};

/// Shared directory of sessions and rooms.
pub struct Registry {
    instance_id: Uuid,
    started_at: Instant,
    next_room_id: AtomicU64,
    next_session_id: AtomicU64,
    rooms: RwLock<BTreeMap<RoomId, RoomHandle>>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            started_at: Instant::now(),
            next_room_id: AtomicU64::new(1),
            next_session_id: AtomicU64::new(1),
            rooms: RwLock::new(BTreeMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Random identifier of this server process.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    /// Hands out the next session id.  Ids are never reused.
    pub fn allocate_session_id(&self) -> SessionId {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn register_session(&self, session: Arc<Session>) {
        debug!(session = session.id(), peer = %session.peer(), "session registered");
        self.sessions.write().await.insert(session.id(), session);
    }

    pub async fn remove_session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    /// Snapshot of all registered sessions, ordered by id.
    pub async fn sessions(&self) -> Vec<Arc<Session>> {
        let mut all: Vec<_> = self.sessions.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.id());
        all
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions whose connection has been marked dead.  Returns the
    /// number removed.
    pub async fn purge_dead_sessions(&self) -> usize {
        let dead: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            let dead = sessions
                .values()
                .filter(|s| !s.is_alive())
                .cloned()
                .collect::<Vec<_>>();
            for session in &dead {
                sessions.remove(&session.id());
            }
            dead
        };
        for session in &dead {
            self.depart(session).await;
        }
        if !dead.is_empty() {
            info!(count = dead.len(), "purged dead sessions");
        }
        dead.len()
    }

    /// Sends `BROADCAST:<text>` to every live session.  Returns how many
    /// accepted it.
    pub async fn broadcast_all(&self, text: &str) -> usize {
        let sessions = self.sessions.read().await;
        let delivered = sessions
            .values()
            .filter(|s| s.send(ServerMessage::Broadcast {
                text: text.to_string(),
            }))
            .count();
        info!(delivered, total = sessions.len(), "operator broadcast sent");
        delivered
    }

    // ── Rooms ─────────────────────────────────────────────────────────────────

    /// Creates an Open room with `session` in slot 1 and returns its id.
    ///
    /// A session already bound to another room leaves it first (forfeiting
    /// if that game was in progress).
    pub async fn create_room(&self, session: &Arc<Session>) -> RoomId {
        let previous = session.binding();
        let id = self.next_room_id.fetch_add(1, Ordering::Relaxed);
        let room = Room::create(id, session);
        self.rooms.write().await.insert(id, room);
        if let Some(previous) = previous {
            self.leave(session, previous).await;
        }
        id
    }

    /// Snapshot of every registered room, ordered by id.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms.values() {
            summaries.push(room.lock().await.summary());
        }
        summaries
    }

    pub async fn lookup_room(&self, id: RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(&id).cloned()
    }

    /// Snapshot of every room handle, ordered by id.
    pub async fn rooms(&self) -> Vec<RoomHandle> {
        self.rooms.read().await.values().cloned().collect()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Joins `session` to room `id` as slot 2.
    ///
    /// On success the session leaves any room it was previously bound to.
    ///
    /// # Errors
    ///
    /// [`JoinError::RoomNotFound`] for an unknown id, otherwise whatever
    /// [`Room::join`] reports.  A failed join leaves every binding untouched.
    pub async fn join_room(&self, session: &Arc<Session>, id: RoomId) -> Result<Slot, JoinError> {
        let room = self
            .lookup_room(id)
            .await
            .ok_or(JoinError::RoomNotFound(id))?;
        let previous = session.binding();
        let slot = room.lock().await.join(session)?;
        if let Some(previous) = previous.filter(|b| b.room_id != id) {
            self.leave(session, previous).await;
        }
        Ok(slot)
    }

    /// Removes `session` from its bound room, if any, reclaiming the room
    /// when it ends up empty.
    pub async fn depart(&self, session: &Session) {
        if let Some(binding) = session.binding() {
            self.leave(session, binding).await;
        }
    }

    /// Removes finished rooms whose game ended at least `ttl` ago.  Returns
    /// the number removed.  Room ids are never reissued.
    pub async fn evict_finished(&self, ttl: Duration) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut expired = Vec::new();
        for (&id, room) in rooms.iter() {
            let mut guard = room.lock().await;
            if guard.finished_for().is_some_and(|age| age >= ttl) {
                guard.close();
                expired.push(id);
            }
        }
        for id in &expired {
            rooms.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), ?expired, "evicted finished rooms");
        }
        expired.len()
    }

    async fn leave(&self, session: &Session, binding: Binding) {
        let Some(room) = binding.room() else {
            session.unbind_from(binding.room_id);
            return;
        };
        let empty = room.lock().await.on_departure(session.id());
        if empty {
            self.reclaim(binding.room_id, &room).await;
        }
    }

    async fn reclaim(&self, id: RoomId, room: &RoomHandle) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(&id).is_some_and(|r| Arc::ptr_eq(r, room)) {
            rooms.remove(&id);
            info!(room = id, "empty room reclaimed");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
