//! Inbound command handling for one session.
//!
//! [`handle_line`] decodes a raw protocol line and [`handle_command`] carries
//! it out against the registry and the session's room.  Nothing here ever
//! fails the connection: malformed lines and rejected moves are logged and
//! dropped.

use std::sync::Arc;

use gomoku_core::{decode_client_command, ClientCommand, ServerMessage};
use tracing::debug;

use crate::application::registry::Registry;
use crate::application::session::Session;

/// Decodes `line` and dispatches it.  Undecodable lines are ignored.
pub async fn handle_line(session: &Arc<Session>, registry: &Registry, line: &str) {
    session.touch();
    match decode_client_command(line) {
        Ok(cmd) => handle_command(session, registry, cmd).await,
        Err(e) => debug!(session = session.id(), error = %e, "ignoring malformed line"),
    }
}

/// Executes one decoded command on behalf of `session`.
pub async fn handle_command(session: &Arc<Session>, registry: &Registry, cmd: ClientCommand) {
    debug!(session = session.id(), command = cmd.keyword(), "dispatching");

    match cmd {
        ClientCommand::CreateRoom => {
            let room_id = registry.create_room(session).await;
            session.send(ServerMessage::RoomCreated { room_id });
        }
        ClientCommand::ListRooms => {
            let rooms = registry.list_rooms().await;
            session.send(ServerMessage::RoomList(rooms));
        }
        ClientCommand::JoinRoom { room_id } => {
            // The start sequence is emitted by the room itself on success.
            if let Err(e) = registry.join_room(session, room_id).await {
                debug!(session = session.id(), room = room_id, error = ?e, "join refused");
                session.send(ServerMessage::JoinFailed {
                    reason: e.to_string(),
                });
            }
        }
        ClientCommand::MakeMove { x, y } => {
            let Some(room) = session.room() else {
                debug!(session = session.id(), "move without a room dropped");
                return;
            };
            let result = room.lock().await.submit_move(session.id(), x, y);
            if let Err(e) = result {
                debug!(session = session.id(), x, y, error = %e, "move rejected");
            }
        }
        ClientCommand::Chat { text } => {
            let Some(room) = session.room() else {
                debug!(session = session.id(), "chat without a room dropped");
                return;
            };
            if !room.lock().await.chat(session.id(), &text) {
                debug!(session = session.id(), "chat not relayed");
            }
        }
        ClientCommand::SetName { name } => session.set_name(name),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
