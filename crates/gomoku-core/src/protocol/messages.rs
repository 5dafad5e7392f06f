//! All Gomoku protocol message types.
//!
//! The wire protocol is line-oriented: one message per line, fields
//! separated by `:`.  This module holds the typed forms; see
//! [`crate::protocol::codec`] for the text encoding.

use std::fmt;

use crate::domain::slot::{GameResult, Slot};

/// Identifier of a room; allocated monotonically, never reused.
pub type RoomId = u64;

/// Longest display name accepted from `SET_NAME`, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Characters that would corrupt `PLAYER_INFO`, `CHAT` or `ROOM_LIST` lines
/// if they appeared in a display name.
pub const RESERVED_NAME_CHARS: [char; 3] = [':', '|', ','];

// ── Client → server ───────────────────────────────────────────────────────────

/// A command sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `CREATE_ROOM`
    CreateRoom,
    /// `LIST_ROOMS`
    ListRooms,
    /// `JOIN_ROOM:<roomId>`
    JoinRoom { room_id: RoomId },
    /// `MAKE_MOVE:<x>:<y>`; coordinates are 1-indexed and unvalidated.
    MakeMove { x: i32, y: i32 },
    /// `CHAT:<text>`; the text is the remainder of the line.
    Chat { text: String },
    /// `SET_NAME:<name>`; the name is already validated.
    SetName { name: String },
}

impl ClientCommand {
    /// The command keyword, for logging without field values.
    pub fn keyword(&self) -> &'static str {
        match self {
            ClientCommand::CreateRoom => "CREATE_ROOM",
            ClientCommand::ListRooms => "LIST_ROOMS",
            ClientCommand::JoinRoom { .. } => "JOIN_ROOM",
            ClientCommand::MakeMove { .. } => "MAKE_MOVE",
            ClientCommand::Chat { .. } => "CHAT",
            ClientCommand::SetName { .. } => "SET_NAME",
        }
    }

    /// Gameplay commands are only meaningful inside a room; a session that
    /// is not bound to one drops them.
    pub fn requires_room(&self) -> bool {
        matches!(self, ClientCommand::MakeMove { .. } | ClientCommand::Chat { .. })
    }
}

// ── Room directory ────────────────────────────────────────────────────────────

/// Lifecycle state of a room as shown in `ROOM_LIST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomStatus {
    /// One occupant waiting for an opponent.
    Open,
    /// Two occupants, game in progress.
    Active,
    /// Won, drawn or forfeited; no more moves accepted.
    Finished,
}

impl RoomStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Open => "OPEN",
            RoomStatus::Active => "ACTIVE",
            RoomStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(RoomStatus::Open),
            "ACTIVE" => Some(RoomStatus::Active),
            "FINISHED" => Some(RoomStatus::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One `ROOM_LIST` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub creator: String,
    pub status: RoomStatus,
}

// ── Server → client ───────────────────────────────────────────────────────────

/// A message sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `ROOM_CREATED:<roomId>`
    RoomCreated { room_id: RoomId },
    /// `ROOM_LIST:<EMPTY | id|creator|status,...>`
    RoomList(Vec<RoomSummary>),
    /// `JOIN_SUCCESS:<roomId>:<slot>`
    JoinSuccess { room_id: RoomId, slot: Slot },
    /// `JOIN_FAILED:<reason>`
    JoinFailed { reason: String },
    /// `GAME_START:<roomId>`
    GameStart { room_id: RoomId },
    /// `PLAYER_INFO:1:<name1>:2:<name2>`
    PlayerInfo { first: String, second: String },
    /// `MOVE:<x>:<y>:<slot>`
    Move { x: u8, y: u8, slot: Slot },
    /// `TURN:<slot>`
    Turn { slot: Slot },
    /// `GAME_OVER:<0|slot>`
    GameOver { result: GameResult },
    /// `CHAT:<fromSlot>:<fromName>:<text>`
    Chat { from: Slot, name: String, text: String },
    /// `PLAYER_DISCONNECTED:<slot>`
    PlayerDisconnected { slot: Slot },
    /// `BROADCAST:<text>`, an operator announcement.
    Broadcast { text: String },
}

impl ServerMessage {
    /// The message keyword, for logging without field values.
    pub fn keyword(&self) -> &'static str {
        match self {
            ServerMessage::RoomCreated { .. } => "ROOM_CREATED",
            ServerMessage::RoomList(_) => "ROOM_LIST",
            ServerMessage::JoinSuccess { .. } => "JOIN_SUCCESS",
            ServerMessage::JoinFailed { .. } => "JOIN_FAILED",
            ServerMessage::GameStart { .. } => "GAME_START",
            ServerMessage::PlayerInfo { .. } => "PLAYER_INFO",
            ServerMessage::Move { .. } => "MOVE",
            ServerMessage::Turn { .. } => "TURN",
            ServerMessage::GameOver { .. } => "GAME_OVER",
            ServerMessage::Chat { .. } => "CHAT",
            ServerMessage::PlayerDisconnected { .. } => "PLAYER_DISCONNECTED",
            ServerMessage::Broadcast { .. } => "BROADCAST",
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::protocol::codec::encode_server_message(self))
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::protocol::codec::encode_client_command(self))
    }
}
