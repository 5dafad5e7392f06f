//! Room: the match and turn authority for one game.
//!
//! A room owns one [`Board`] and up to two occupants.  Every operation runs
//! with the room's `tokio::sync::Mutex` held, so two racing move submissions
//! can never both pass the turn check and both occupants see broadcasts in
//! the same order.
//!
//! # Lifecycle
//!
//! ```text
//! Open ──join──► Active ──win / draw / departure──► Finished
//!   │                                                  │
//!   └──creator leaves──► (empty, reclaimed)  ◄──both leave
//! ```

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use gomoku_core::{
    Board, BoardError, GameResult, Point, RoomId, RoomStatus, RoomSummary, ServerMessage, Slot,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::session::{Binding, RoomHandle, Session, SessionId};

/// Why a join attempt failed.  The display text is the `JOIN_FAILED` reason.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("room not found")]
    RoomNotFound(RoomId),
    #[error("room is full")]
    RoomFull(RoomId),
    #[error("already in this room")]
    AlreadyInRoom(RoomId),
}

/// Why a move was not applied.  Rejections are silent on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    #[error("room is not in play")]
    NotActive,
    #[error("slot {got} moved but it is slot {expected}'s turn")]
    NotYourTurn { expected: Slot, got: Slot },
    #[error("session does not occupy this room")]
    NotOccupant,
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// One game between at most two sessions.
pub struct Room {
    id: RoomId,
    handle: Weak<Mutex<Room>>,
    occupants: [Option<Arc<Session>>; 2],
    board: Board,
    status: RoomStatus,
    creator: String,
    created_at: Instant,
    finished_at: Option<Instant>,
}

impl Room {
    /// Creates an Open room with `creator` bound to slot 1.
    pub fn create(id: RoomId, creator: &Arc<Session>) -> RoomHandle {
        Arc::new_cyclic(|handle: &Weak<Mutex<Room>>| {
            creator.bind(Binding::new(id, Slot::One, handle.clone()));
            info!(room = id, session = creator.id(), "room created");
            Mutex::new(Room {
                id,
                handle: handle.clone(),
                occupants: [Some(Arc::clone(creator)), None],
                board: Board::new(),
                status: RoomStatus::Open,
                creator: creator.display_name(),
                created_at: Instant::now(),
                finished_at: None,
            })
        })
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the game ended, if it has.
    pub fn finished_for(&self) -> Option<Duration> {
        self.finished_at.map(|at| at.elapsed())
    }

    /// Current creator name: the live name of slot 1 while it is occupied,
    /// otherwise the name it had when the room was created.
    pub fn creator_name(&self) -> String {
        self.occupant(Slot::One)
            .map(|s| s.display_name())
            .unwrap_or_else(|| self.creator.clone())
    }

    pub fn occupant(&self, slot: Slot) -> Option<&Arc<Session>> {
        self.occupants[slot.index()].as_ref()
    }

    /// Slot held by `session_id` in this room.
    pub fn slot_of(&self, session_id: SessionId) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|&slot| self.occupant(slot).is_some_and(|s| s.id() == session_id))
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.iter().all(Option::is_none)
    }

    /// Slot whose turn it is, derived from the board's side to move.
    pub fn turn(&self) -> Slot {
        Slot::from_stone(self.board.to_move())
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id,
            creator: self.creator_name(),
            status: self.status,
        }
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Admits `session` as slot 2 and starts the game.
    ///
    /// Each occupant receives `JOIN_SUCCESS` with its own slot, then both
    /// receive `GAME_START`, `PLAYER_INFO` and `TURN:1`.
    ///
    /// # Errors
    ///
    /// - [`JoinError::AlreadyInRoom`] if `session` already occupies this room.
    /// - [`JoinError::RoomNotFound`] if the room has emptied and is being
    ///   reclaimed.
    /// - [`JoinError::RoomFull`] if the room is not Open.
    pub fn join(&mut self, session: &Arc<Session>) -> Result<Slot, JoinError> {
        if self.slot_of(session.id()).is_some() {
            return Err(JoinError::AlreadyInRoom(self.id));
        }
        if self.is_empty() {
            return Err(JoinError::RoomNotFound(self.id));
        }
        if self.status != RoomStatus::Open || self.occupant(Slot::Two).is_some() {
            return Err(JoinError::RoomFull(self.id));
        }

        session.bind(Binding::new(self.id, Slot::Two, self.handle.clone()));
        self.occupants[Slot::Two.index()] = Some(Arc::clone(session));
        self.status = RoomStatus::Active;
        info!(room = self.id, session = session.id(), "opponent joined; game started");

        self.announce_start();
        Ok(Slot::Two)
    }

    /// Applies a move from `session_id` and broadcasts its consequences.
    ///
    /// On acceptance both occupants get `MOVE`, followed by either
    /// `GAME_OVER` (and the room finishes) or `TURN` for the next slot.
    ///
    /// # Errors
    ///
    /// Returns a [`MoveRejection`] and changes nothing if the room is not
    /// Active, the sender is not an occupant, it is not the sender's turn or
    /// the board refuses the placement.
    pub fn submit_move(
        &mut self,
        session_id: SessionId,
        x: i32,
        y: i32,
    ) -> Result<Point, MoveRejection> {
        let slot = self.slot_of(session_id).ok_or(MoveRejection::NotOccupant)?;
        if self.status != RoomStatus::Active {
            return Err(MoveRejection::NotActive);
        }
        let expected = self.turn();
        if slot != expected {
            return Err(MoveRejection::NotYourTurn {
                expected,
                got: slot,
            });
        }

        let point = self.board.place_stone(x, y)?;
        debug!(room = self.id, %slot, %point, "move accepted");
        self.broadcast(&ServerMessage::Move {
            x: point.x,
            y: point.y,
            slot,
        });

        match GameResult::from_outcome(self.board.outcome()) {
            Some(result) => self.finish(result),
            None => self.broadcast(&ServerMessage::Turn { slot: self.turn() }),
        }
        Ok(point)
    }

    /// Relays a chat line from `session_id` to both occupants.
    ///
    /// Chat is accepted once the game has started, including after it has
    /// finished.  Returns whether the line was relayed.
    pub fn chat(&self, session_id: SessionId, text: &str) -> bool {
        let Some(from) = self.slot_of(session_id) else {
            return false;
        };
        if self.status == RoomStatus::Open {
            return false;
        }
        let name = self
            .occupant(from)
            .map(|s| s.display_name())
            .unwrap_or_default();
        self.broadcast(&ServerMessage::Chat {
            from,
            name,
            text: text.to_string(),
        });
        true
    }

    /// Removes `session_id` from the room.
    ///
    /// If the game was in progress the remaining occupant receives
    /// `PLAYER_DISCONNECTED` and `GAME_OVER` naming itself the winner.
    /// Returns whether the room is now empty and can be reclaimed.
    pub fn on_departure(&mut self, session_id: SessionId) -> bool {
        let Some(slot) = self.slot_of(session_id) else {
            return self.is_empty();
        };
        if let Some(session) = self.occupants[slot.index()].take() {
            session.unbind_from(self.id);
        }
        info!(room = self.id, session = session_id, %slot, "occupant left");

        if self.status == RoomStatus::Active {
            self.broadcast(&ServerMessage::PlayerDisconnected { slot });
            self.finish(GameResult::Winner(slot.other()));
        }
        self.is_empty()
    }

    /// Unbinds every remaining occupant.  Used when the room is evicted.
    pub fn close(&mut self) {
        for occupant in self.occupants.iter_mut() {
            if let Some(session) = occupant.take() {
                session.unbind_from(self.id);
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn announce_start(&self) {
        for slot in Slot::ALL {
            if let Some(session) = self.occupant(slot) {
                session.send(ServerMessage::JoinSuccess {
                    room_id: self.id,
                    slot,
                });
            }
        }
        let first = self.names_for(Slot::One);
        let second = self.names_for(Slot::Two);
        self.broadcast(&ServerMessage::GameStart { room_id: self.id });
        self.broadcast(&ServerMessage::PlayerInfo { first, second });
        self.broadcast(&ServerMessage::Turn { slot: self.turn() });
    }

    fn names_for(&self, slot: Slot) -> String {
        self.occupant(slot)
            .map(|s| s.display_name())
            .unwrap_or_else(|| format!("Player{slot}"))
    }

    fn finish(&mut self, result: GameResult) {
        self.status = RoomStatus::Finished;
        self.finished_at = Some(Instant::now());
        info!(room = self.id, result = result.number(), "game over");
        self.broadcast(&ServerMessage::GameOver { result });
    }

    fn broadcast(&self, msg: &ServerMessage) {
        for session in self.occupants.iter().flatten() {
            session.send(msg.clone());
        }
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("occupants", &self.occupants)
            .field("moves", &self.board.history().len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::ChannelSink;
    use tokio::sync::mpsc;

    struct Player {
        session: Arc<Session>,
        rx: mpsc::Receiver<ServerMessage>,
    }

    impl Player {
        fn new(id: SessionId) -> Self {
            let (sink, rx) = ChannelSink::channel(64);
            let session = Arc::new(Session::new(
                id,
                "127.0.0.1:50000".parse().unwrap(),
                Box::new(sink),
            ));
            Self { session, rx }
        }

        fn drain(&mut self) -> Vec<String> {
            let mut lines = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                lines.push(msg.to_string());
            }
            lines
        }
    }

    /// Room with alice in slot 1 and bob in slot 2, queues drained.
    async fn active_room() -> (RoomHandle, Player, Player) {
        let mut alice = Player::new(1);
        let mut bob = Player::new(2);
        let room = Room::create(10, &alice.session);
        room.lock().await.join(&bob.session).unwrap();
        alice.drain();
        bob.drain();
        (room, alice, bob)
    }

    #[tokio::test]
    async fn test_create_binds_creator_to_slot_one() {
        let alice = Player::new(1);
        let room = Room::create(3, &alice.session);

        let guard = room.lock().await;
        assert_eq!(guard.status(), RoomStatus::Open);
        assert_eq!(guard.slot_of(1), Some(Slot::One));
        assert_eq!(alice.session.room_id(), Some(3));
        assert_eq!(guard.creator_name(), "Player1");
        assert!(Arc::ptr_eq(&alice.session.room().unwrap(), &room));
    }

    #[tokio::test]
    async fn test_join_emits_start_sequence_to_both() {
        // Arrange
        let mut alice = Player::new(1);
        let mut bob = Player::new(2);
        alice.session.set_name("alice".to_string());
        let room = Room::create(10, &alice.session);

        // Act
        let slot = room.lock().await.join(&bob.session);

        // Assert
        assert_eq!(slot, Ok(Slot::Two));
        assert_eq!(room.lock().await.status(), RoomStatus::Active);
        assert_eq!(
            alice.drain(),
            vec![
                "JOIN_SUCCESS:10:1",
                "GAME_START:10",
                "PLAYER_INFO:1:alice:2:Player2",
                "TURN:1"
            ]
        );
        assert_eq!(
            bob.drain(),
            vec![
                "JOIN_SUCCESS:10:2",
                "GAME_START:10",
                "PLAYER_INFO:1:alice:2:Player2",
                "TURN:1"
            ]
        );
    }

    #[tokio::test]
    async fn test_same_session_cannot_join_twice() {
        let mut alice = Player::new(1);
        let room = Room::create(10, &alice.session);

        let result = room.lock().await.join(&alice.session);

        assert_eq!(result, Err(JoinError::AlreadyInRoom(10)));
        assert_eq!(room.lock().await.status(), RoomStatus::Open);
        assert!(alice.drain().is_empty());
    }

    #[tokio::test]
    async fn test_third_session_is_never_admitted() {
        let (room, _alice, _bob) = active_room().await;
        let mut carol = Player::new(3);

        let result = room.lock().await.join(&carol.session);

        assert_eq!(result, Err(JoinError::RoomFull(10)));
        assert_eq!(carol.session.room_id(), None);
        assert!(carol.drain().is_empty());
    }

    #[tokio::test]
    async fn test_accepted_move_broadcasts_move_then_turn() {
        let (room, mut alice, mut bob) = active_room().await;

        let point = room.lock().await.submit_move(1, 8, 8).unwrap();

        assert_eq!((point.x, point.y), (8, 8));
        assert_eq!(alice.drain(), vec!["MOVE:8:8:1", "TURN:2"]);
        assert_eq!(bob.drain(), vec!["MOVE:8:8:1", "TURN:2"]);
    }

    #[tokio::test]
    async fn test_wrong_turn_is_rejected_silently() {
        let (room, mut alice, mut bob) = active_room().await;

        let result = room.lock().await.submit_move(2, 8, 8);

        assert_eq!(
            result,
            Err(MoveRejection::NotYourTurn {
                expected: Slot::One,
                got: Slot::Two
            })
        );
        assert!(alice.drain().is_empty());
        assert!(bob.drain().is_empty());
        assert!(!room.lock().await.board().has_history());
    }

    #[tokio::test]
    async fn test_move_in_open_room_is_rejected() {
        let alice = Player::new(1);
        let room = Room::create(1, &alice.session);

        let result = room.lock().await.submit_move(1, 8, 8);

        assert_eq!(result, Err(MoveRejection::NotActive));
    }

    #[tokio::test]
    async fn test_board_errors_are_rejections() {
        let (room, mut alice, _bob) = active_room().await;
        let mut guard = room.lock().await;

        assert_eq!(
            guard.submit_move(1, 0, 8),
            Err(MoveRejection::Board(BoardError::OutOfBounds { x: 0, y: 8 }))
        );
        guard.submit_move(1, 8, 8).unwrap();
        guard.submit_move(2, 9, 9).unwrap();
        assert_eq!(
            guard.submit_move(1, 9, 9),
            Err(MoveRejection::Board(BoardError::Occupied { x: 9, y: 9 }))
        );
        drop(guard);
        assert_eq!(alice.drain().len(), 4);
    }

    #[tokio::test]
    async fn test_non_occupant_cannot_move() {
        let (room, _alice, _bob) = active_room().await;
        assert_eq!(
            room.lock().await.submit_move(99, 8, 8),
            Err(MoveRejection::NotOccupant)
        );
    }

    #[tokio::test]
    async fn test_five_in_a_row_finishes_the_game() {
        // Arrange
        let (room, mut alice, mut bob) = active_room().await;
        let mut guard = room.lock().await;
        for x in 1..=4 {
            guard.submit_move(1, x, 1).unwrap();
            guard.submit_move(2, x, 2).unwrap();
        }
        alice.drain();
        bob.drain();

        // Act
        guard.submit_move(1, 5, 1).unwrap();

        // Assert
        assert_eq!(guard.status(), RoomStatus::Finished);
        assert!(guard.finished_for().is_some());
        assert_eq!(alice.drain(), vec!["MOVE:5:1:1", "GAME_OVER:1"]);
        assert_eq!(bob.drain(), vec!["MOVE:5:1:1", "GAME_OVER:1"]);
        assert_eq!(guard.submit_move(2, 9, 9), Err(MoveRejection::NotActive));
    }

    #[tokio::test]
    async fn test_chat_reaches_both_occupants() {
        let (room, mut alice, mut bob) = active_room().await;
        bob.session.set_name("bob".to_string());

        assert!(room.lock().await.chat(2, "hi: there"));

        assert_eq!(alice.drain(), vec!["CHAT:2:bob:hi: there"]);
        assert_eq!(bob.drain(), vec!["CHAT:2:bob:hi: there"]);
    }

    #[tokio::test]
    async fn test_chat_in_open_room_is_dropped() {
        let mut alice = Player::new(1);
        let room = Room::create(1, &alice.session);

        assert!(!room.lock().await.chat(1, "anyone?"));
        assert!(alice.drain().is_empty());
    }

    #[tokio::test]
    async fn test_departure_while_active_forfeits() {
        let (room, mut alice, bob) = active_room().await;

        let empty = room.lock().await.on_departure(2);

        assert!(!empty);
        assert_eq!(alice.drain(), vec!["PLAYER_DISCONNECTED:2", "GAME_OVER:1"]);
        assert_eq!(room.lock().await.status(), RoomStatus::Finished);
        assert_eq!(bob.session.room_id(), None);
        assert_eq!(alice.session.room_id(), Some(10));
    }

    #[tokio::test]
    async fn test_departure_while_open_is_silent_and_reclaimable() {
        let mut alice = Player::new(1);
        let room = Room::create(1, &alice.session);

        let empty = room.lock().await.on_departure(1);

        assert!(empty);
        assert!(alice.drain().is_empty());
        assert_eq!(room.lock().await.status(), RoomStatus::Open);
    }

    #[tokio::test]
    async fn test_emptied_room_cannot_be_joined() {
        let alice = Player::new(1);
        let bob = Player::new(2);
        let room = Room::create(1, &alice.session);
        room.lock().await.on_departure(1);

        assert_eq!(
            room.lock().await.join(&bob.session),
            Err(JoinError::RoomNotFound(1))
        );
    }

    #[tokio::test]
    async fn test_departure_after_finish_is_silent() {
        let (room, mut alice, _bob) = active_room().await;
        room.lock().await.on_departure(2);
        alice.drain();

        let empty = room.lock().await.on_departure(1);

        assert!(empty);
        assert!(alice.drain().is_empty());
    }

    #[tokio::test]
    async fn test_close_unbinds_everyone() {
        let (room, alice, bob) = active_room().await;

        room.lock().await.close();

        assert!(room.lock().await.is_empty());
        assert_eq!(alice.session.room_id(), None);
        assert_eq!(bob.session.room_id(), None);
    }

    #[tokio::test]
    async fn test_creator_name_follows_set_name() {
        let alice = Player::new(1);
        let room = Room::create(1, &alice.session);
        alice.session.set_name("alice".to_string());

        assert_eq!(room.lock().await.summary().creator, "alice");
    }
}
