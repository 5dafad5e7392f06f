//! Operator console on stdin.
//!
//! One command per line.  Commands are parsed by [`ConsoleCommand::parse`]
//! and carried out by [`execute`], which returns the text to print; the
//! stdin loop in [`run_console`] only does the I/O.
//!
//! | Command            | Effect                                        |
//! |--------------------|-----------------------------------------------|
//! | `status`           | uptime, instance id, session and room counts  |
//! | `rooms`            | every room with its occupants and status      |
//! | `room <id>`        | one room in detail, including the board       |
//! | `clients`          | every session with name, address and liveness |
//! | `broadcast <text>` | `BROADCAST:<text>` to every session           |
//! | `cleanup`          | purge dead sessions                           |
//! | `evict`            | run the finished-room sweep now               |
//! | `quit`             | graceful shutdown                             |
//! | `help`             | this list                                     |

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gomoku_core::{RoomId, Slot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::application::Registry;
use crate::infrastructure::network::sweep;

const HELP: &str = "\
commands:
  status            server uptime and counts
  rooms             list every room
  room <id>         show one room and its board
  clients           list every connected session
  broadcast <text>  announce to every session
  cleanup           purge dead sessions
  evict             evict expired finished rooms now
  quit              shut the server down
  help              show this help";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Rooms,
    Room(RoomId),
    Clients,
    Broadcast(String),
    Cleanup,
    Evict,
    Quit,
    Help,
}

impl ConsoleCommand {
    /// Parses one console line.  Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a message describing the problem for unknown commands or bad
    /// arguments.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "status" => ConsoleCommand::Status,
            "rooms" => ConsoleCommand::Rooms,
            "room" => {
                let id = rest
                    .parse()
                    .map_err(|_| format!("usage: room <id> (got {rest:?})"))?;
                ConsoleCommand::Room(id)
            }
            "clients" => ConsoleCommand::Clients,
            "broadcast" if rest.is_empty() => return Err("usage: broadcast <text>".to_string()),
            "broadcast" => ConsoleCommand::Broadcast(rest.to_string()),
            "cleanup" => ConsoleCommand::Cleanup,
            "evict" => ConsoleCommand::Evict,
            "quit" | "exit" => ConsoleCommand::Quit,
            "help" | "?" => ConsoleCommand::Help,
            other => return Err(format!("unknown command {other:?}; try `help`")),
        };
        Ok(Some(cmd))
    }
}

/// Carries out `cmd` and returns the text to show the operator.
pub async fn execute(
    cmd: ConsoleCommand,
    registry: &Registry,
    finished_ttl: Duration,
    running: &AtomicBool,
) -> String {
    match cmd {
        ConsoleCommand::Status => format!(
            "instance {}\nuptime {}s\nsessions {}\nrooms {}",
            registry.instance_id(),
            registry.uptime().as_secs(),
            registry.session_count().await,
            registry.room_count().await,
        ),
        ConsoleCommand::Rooms => list_rooms(registry).await,
        ConsoleCommand::Room(id) => show_room(registry, id).await,
        ConsoleCommand::Clients => list_clients(registry).await,
        ConsoleCommand::Broadcast(text) => {
            let delivered = registry.broadcast_all(&text).await;
            format!("broadcast delivered to {delivered} session(s)")
        }
        ConsoleCommand::Cleanup => {
            let purged = registry.purge_dead_sessions().await;
            format!("purged {purged} dead session(s)")
        }
        ConsoleCommand::Evict => {
            let report = sweep(registry, finished_ttl).await;
            format!(
                "evicted {} room(s), purged {} session(s)",
                report.rooms_evicted, report.sessions_purged
            )
        }
        ConsoleCommand::Quit => {
            running.store(false, Ordering::Relaxed);
            "shutting down".to_string()
        }
        ConsoleCommand::Help => HELP.to_string(),
    }
}

async fn list_rooms(registry: &Registry) -> String {
    let rooms = registry.rooms().await;
    if rooms.is_empty() {
        return "no rooms".to_string();
    }
    let mut out = String::new();
    for room in rooms {
        let room = room.lock().await;
        let _ = write!(out, "#{} {:<8} moves={}", room.id(), room.status(), room.board().history().len());
        for slot in Slot::ALL {
            match room.occupant(slot) {
                Some(s) => {
                    let _ = write!(out, "  [{slot}] {} ({})", s.display_name(), s.peer());
                }
                None => {
                    let _ = write!(out, "  [{slot}] -");
                }
            }
        }
        out.push('\n');
    }
    out.pop();
    out
}

async fn show_room(registry: &Registry, id: RoomId) -> String {
    let Some(room) = registry.lookup_room(id).await else {
        return format!("room {id} not found");
    };
    let room = room.lock().await;
    let mut out = format!(
        "room {} status={} created {}s ago\n",
        room.id(),
        room.status(),
        room.created_at().elapsed().as_secs()
    );
    for slot in Slot::ALL {
        let who = room
            .occupant(slot)
            .map(|s| format!("{} ({})", s.display_name(), s.peer()))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "slot {slot}: {who}");
    }
    let _ = writeln!(out, "to move: slot {}", room.turn());
    let _ = write!(out, "{}", room.board());
    out
}

async fn list_clients(registry: &Registry) -> String {
    let sessions = registry.sessions().await;
    if sessions.is_empty() {
        return "no clients".to_string();
    }
    let mut out = String::new();
    for s in sessions {
        let room = s
            .room_id()
            .map(|id| format!("room {id}"))
            .unwrap_or_else(|| "lobby".to_string());
        let _ = writeln!(
            out,
            "{:>4} {:<16} {:<21} {:<9} idle {}s{}",
            s.id(),
            s.display_name(),
            s.peer(),
            room,
            s.idle_for().as_secs(),
            if s.is_alive() { "" } else { " (dead)" }
        );
    }
    out.pop();
    out
}

/// Reads console commands from stdin until EOF, `quit`, or shutdown.
pub async fn run_console(registry: Arc<Registry>, finished_ttl: Duration, running: Arc<AtomicBool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("operator console ready; type `help` for commands");

    while running.load(Ordering::Relaxed) {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("console input closed");
                return;
            }
            Err(e) => {
                warn!("console read failed: {e}");
                return;
            }
        };
        match ConsoleCommand::parse(&line) {
            Ok(Some(cmd)) => {
                let output = execute(cmd, &registry, finished_ttl, &running).await;
                println!("{output}");
            }
            Ok(None) => {}
            Err(msg) => println!("{msg}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
