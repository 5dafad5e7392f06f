//! Line codec for the Gomoku text protocol.
//!
//! Wire format: one message per line, colon-delimited.
//!
//! ```text
//! KEYWORD[:field[:field...]]
//! ```
//!
//! Lines are handled without their terminator; a trailing `\r` is tolerated
//! so that clients sending CRLF work unchanged.  Free-text fields (`CHAT`
//! text, `SET_NAME`, `BROADCAST`, `JOIN_FAILED` reasons) take the remainder
//! of the line and may themselves contain `:`.

use thiserror::Error;

use crate::domain::slot::{GameResult, Slot};
use crate::protocol::messages::{
    ClientCommand, RoomStatus, RoomSummary, ServerMessage, MAX_NAME_LEN, RESERVED_NAME_CHARS,
};

/// Errors that can occur while decoding a protocol line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line was empty (or only whitespace).
    #[error("empty line")]
    Empty,

    /// The keyword is not part of the protocol.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A required field is absent.
    #[error("{command}: missing field `{field}`")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    /// A numeric field did not parse.
    #[error("invalid number for `{field}`: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// A slot field was not `1` or `2`.
    #[error("invalid slot: {0}")]
    InvalidSlot(String),

    /// A `GAME_OVER` field was not `0`, `1` or `2`.
    #[error("invalid game result: {0}")]
    InvalidOutcome(String),

    /// A `ROOM_LIST` entry was malformed.
    #[error("invalid room entry: {0:?}")]
    InvalidRoomEntry(String),

    /// A display name was empty, too long or contained a delimiter.
    #[error("invalid display name: {0:?}")]
    InvalidName(String),

    /// The line exceeded the configured maximum length.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`ClientCommand`] as a protocol line (without terminator).
///
/// # Examples
///
/// ```rust
/// use gomoku_core::{decode_client_command, encode_client_command, ClientCommand};
///
/// let cmd = ClientCommand::MakeMove { x: 8, y: 8 };
/// let line = encode_client_command(&cmd);
/// assert_eq!(line, "MAKE_MOVE:8:8");
/// assert_eq!(decode_client_command(&line).unwrap(), cmd);
/// ```
pub fn encode_client_command(cmd: &ClientCommand) -> String {
    match cmd {
        ClientCommand::CreateRoom => "CREATE_ROOM".to_string(),
        ClientCommand::ListRooms => "LIST_ROOMS".to_string(),
        ClientCommand::JoinRoom { room_id } => format!("JOIN_ROOM:{room_id}"),
        ClientCommand::MakeMove { x, y } => format!("MAKE_MOVE:{x}:{y}"),
        ClientCommand::Chat { text } => format!("CHAT:{text}"),
        ClientCommand::SetName { name } => format!("SET_NAME:{name}"),
    }
}

/// Decodes one client line into a [`ClientCommand`].
///
/// # Errors
///
/// Returns [`ProtocolError`] for empty lines, unknown keywords, missing or
/// non-numeric fields and unacceptable display names.
pub fn decode_client_command(line: &str) -> Result<ClientCommand, ProtocolError> {
    let line = strip_terminator(line);
    if line.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }
    let (keyword, rest) = split_keyword(line);

    match keyword {
        "CREATE_ROOM" => Ok(ClientCommand::CreateRoom),
        "LIST_ROOMS" => Ok(ClientCommand::ListRooms),
        "JOIN_ROOM" => {
            let mut fields = fields(rest);
            let room_id = parse_u64(required(fields.next(), "JOIN_ROOM", "roomId")?, "roomId")?;
            Ok(ClientCommand::JoinRoom { room_id })
        }
        "MAKE_MOVE" => {
            let mut fields = fields(rest);
            let x = parse_i32(required(fields.next(), "MAKE_MOVE", "x")?, "x")?;
            let y = parse_i32(required(fields.next(), "MAKE_MOVE", "y")?, "y")?;
            Ok(ClientCommand::MakeMove { x, y })
        }
        "CHAT" => {
            let text = remainder(rest, "CHAT", "text")?;
            Ok(ClientCommand::Chat {
                text: text.to_string(),
            })
        }
        "SET_NAME" => {
            let name = validate_name(remainder(rest, "SET_NAME", "name")?)?;
            Ok(ClientCommand::SetName { name })
        }
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

/// Encodes a [`ServerMessage`] as a protocol line (without terminator).
///
/// # Examples
///
/// ```rust
/// use gomoku_core::{encode_server_message, ServerMessage, Slot};
///
/// let line = encode_server_message(&ServerMessage::Move { x: 3, y: 4, slot: Slot::Two });
/// assert_eq!(line, "MOVE:3:4:2");
/// ```
pub fn encode_server_message(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::RoomCreated { room_id } => format!("ROOM_CREATED:{room_id}"),
        ServerMessage::RoomList(rooms) => {
            if rooms.is_empty() {
                "ROOM_LIST:EMPTY".to_string()
            } else {
                let entries: Vec<String> = rooms
                    .iter()
                    .map(|r| format!("{}|{}|{}", r.room_id, r.creator, r.status))
                    .collect();
                format!("ROOM_LIST:{}", entries.join(","))
            }
        }
        ServerMessage::JoinSuccess { room_id, slot } => format!("JOIN_SUCCESS:{room_id}:{slot}"),
        ServerMessage::JoinFailed { reason } => format!("JOIN_FAILED:{reason}"),
        ServerMessage::GameStart { room_id } => format!("GAME_START:{room_id}"),
        ServerMessage::PlayerInfo { first, second } => {
            format!("PLAYER_INFO:1:{first}:2:{second}")
        }
        ServerMessage::Move { x, y, slot } => format!("MOVE:{x}:{y}:{slot}"),
        ServerMessage::Turn { slot } => format!("TURN:{slot}"),
        ServerMessage::GameOver { result } => format!("GAME_OVER:{}", result.number()),
        ServerMessage::Chat { from, name, text } => format!("CHAT:{from}:{name}:{text}"),
        ServerMessage::PlayerDisconnected { slot } => format!("PLAYER_DISCONNECTED:{slot}"),
        ServerMessage::Broadcast { text } => format!("BROADCAST:{text}"),
    }
}

/// Decodes one server line into a [`ServerMessage`].
///
/// # Errors
///
/// Returns [`ProtocolError`] if the line is not a well-formed server message.
pub fn decode_server_message(line: &str) -> Result<ServerMessage, ProtocolError> {
    let line = strip_terminator(line);
    if line.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }
    let (keyword, rest) = split_keyword(line);

    match keyword {
        "ROOM_CREATED" => {
            let mut f = fields(rest);
            let room_id = parse_u64(required(f.next(), "ROOM_CREATED", "roomId")?, "roomId")?;
            Ok(ServerMessage::RoomCreated { room_id })
        }
        "ROOM_LIST" => {
            let body = remainder(rest, "ROOM_LIST", "rooms")?;
            if body == "EMPTY" {
                return Ok(ServerMessage::RoomList(Vec::new()));
            }
            body.split(',')
                .map(decode_room_entry)
                .collect::<Result<Vec<_>, _>>()
                .map(ServerMessage::RoomList)
        }
        "JOIN_SUCCESS" => {
            let mut f = fields(rest);
            let room_id = parse_u64(required(f.next(), "JOIN_SUCCESS", "roomId")?, "roomId")?;
            let slot = parse_slot(required(f.next(), "JOIN_SUCCESS", "slot")?)?;
            Ok(ServerMessage::JoinSuccess { room_id, slot })
        }
        "JOIN_FAILED" => Ok(ServerMessage::JoinFailed {
            reason: remainder(rest, "JOIN_FAILED", "reason")?.to_string(),
        }),
        "GAME_START" => {
            let mut f = fields(rest);
            let room_id = parse_u64(required(f.next(), "GAME_START", "roomId")?, "roomId")?;
            Ok(ServerMessage::GameStart { room_id })
        }
        "PLAYER_INFO" => {
            let mut f = fields(rest);
            let one = required(f.next(), "PLAYER_INFO", "slot1")?;
            let first = required(f.next(), "PLAYER_INFO", "name1")?;
            let two = required(f.next(), "PLAYER_INFO", "slot2")?;
            let second = required(f.next(), "PLAYER_INFO", "name2")?;
            if parse_slot(one)? != Slot::One || parse_slot(two)? != Slot::Two {
                return Err(ProtocolError::InvalidSlot(format!("{one}/{two}")));
            }
            Ok(ServerMessage::PlayerInfo {
                first: first.to_string(),
                second: second.to_string(),
            })
        }
        "MOVE" => {
            let mut f = fields(rest);
            let x = parse_u8(required(f.next(), "MOVE", "x")?, "x")?;
            let y = parse_u8(required(f.next(), "MOVE", "y")?, "y")?;
            let slot = parse_slot(required(f.next(), "MOVE", "slot")?)?;
            Ok(ServerMessage::Move { x, y, slot })
        }
        "TURN" => {
            let mut f = fields(rest);
            let slot = parse_slot(required(f.next(), "TURN", "slot")?)?;
            Ok(ServerMessage::Turn { slot })
        }
        "GAME_OVER" => {
            let mut f = fields(rest);
            let raw = required(f.next(), "GAME_OVER", "result")?;
            let result = raw
                .parse::<u8>()
                .ok()
                .and_then(GameResult::from_number)
                .ok_or_else(|| ProtocolError::InvalidOutcome(raw.to_string()))?;
            Ok(ServerMessage::GameOver { result })
        }
        "CHAT" => {
            let body = remainder(rest, "CHAT", "fromSlot")?;
            let mut parts = body.splitn(3, ':');
            let from = parse_slot(required(parts.next(), "CHAT", "fromSlot")?)?;
            let name = required(parts.next(), "CHAT", "fromName")?;
            let text = parts.next().unwrap_or_default();
            Ok(ServerMessage::Chat {
                from,
                name: name.to_string(),
                text: text.to_string(),
            })
        }
        "PLAYER_DISCONNECTED" => {
            let mut f = fields(rest);
            let slot = parse_slot(required(f.next(), "PLAYER_DISCONNECTED", "slot")?)?;
            Ok(ServerMessage::PlayerDisconnected { slot })
        }
        "BROADCAST" => Ok(ServerMessage::Broadcast {
            text: rest.unwrap_or_default().to_string(),
        }),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

/// Checks a requested display name and returns its trimmed form.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidName`] if the trimmed name is empty,
/// longer than [`MAX_NAME_LEN`] characters or contains one of
/// [`RESERVED_NAME_CHARS`].
pub fn validate_name(raw: &str) -> Result<String, ProtocolError> {
    let name = raw.trim();
    if name.is_empty()
        || name.chars().count() > MAX_NAME_LEN
        || name.contains(RESERVED_NAME_CHARS)
    {
        return Err(ProtocolError::InvalidName(raw.to_string()));
    }
    Ok(name.to_string())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Splits `KEYWORD:rest` into its keyword and the (optional) remainder.
fn split_keyword(line: &str) -> (&str, Option<&str>) {
    match line.split_once(':') {
        Some((keyword, rest)) => (keyword.trim(), Some(rest)),
        None => (line.trim(), None),
    }
}

fn fields(rest: Option<&str>) -> impl Iterator<Item = &str> {
    rest.into_iter().flat_map(|r| r.split(':'))
}

fn required<'a>(
    field: Option<&'a str>,
    command: &'static str,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    match field {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ProtocolError::MissingField {
            command,
            field: name,
        }),
    }
}

/// The whole remainder of the line; must be non-empty.
fn remainder<'a>(
    rest: Option<&'a str>,
    command: &'static str,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    required(rest, command, name)
}

fn parse_u64(raw: &str, field: &'static str) -> Result<u64, ProtocolError> {
    raw.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

fn parse_i32(raw: &str, field: &'static str) -> Result<i32, ProtocolError> {
    raw.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

fn parse_u8(raw: &str, field: &'static str) -> Result<u8, ProtocolError> {
    raw.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

fn parse_slot(raw: &str) -> Result<Slot, ProtocolError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .and_then(Slot::from_number)
        .ok_or_else(|| ProtocolError::InvalidSlot(raw.to_string()))
}

fn decode_room_entry(entry: &str) -> Result<RoomSummary, ProtocolError> {
    let mut parts = entry.split('|');
    let (Some(id), Some(creator), Some(status), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ProtocolError::InvalidRoomEntry(entry.to_string()));
    };
    let room_id = parse_u64(id, "roomId")?;
    let status =
        RoomStatus::parse(status).ok_or_else(|| ProtocolError::InvalidRoomEntry(entry.to_string()))?;
    Ok(RoomSummary {
        room_id,
        creator: creator.to_string(),
        status,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
