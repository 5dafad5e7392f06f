//! End-to-end tests over real TCP sockets.
//!
//! Each test binds the server to `127.0.0.1:0`, connects plain TCP clients
//! and speaks the line protocol exactly as a game client would.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gomoku_server::application::Registry;
use gomoku_server::domain::ServerConfig;
use gomoku_server::infrastructure::serve;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    registry: Arc<Registry>,
    running: Arc<AtomicBool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let registry = Arc::new(Registry::new());
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(serve(
            listener,
            config,
            Arc::clone(&registry),
            Arc::clone(&running),
        ));
        Self {
            addr,
            registry,
            running,
            handle,
        }
    }

    async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server stops after the flag is cleared")
            .unwrap()
            .unwrap();
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a server line")
            .unwrap();
        assert!(n > 0, "server closed the connection");
        line.trim_end().to_string()
    }

    async fn recv_n(&mut self, n: usize) -> Vec<String> {
        let mut lines = Vec::with_capacity(n);
        for _ in 0..n {
            lines.push(self.recv().await);
        }
        lines
    }

    /// Returns true once the server has closed the connection.
    async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(
            timeout(READ_TIMEOUT, self.reader.read_line(&mut line)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}

/// Connects two clients, creates a room and joins it; the start sequence is
/// consumed.
async fn start_game(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    alice.send("SET_NAME:alice").await;
    alice.send("CREATE_ROOM").await;
    assert_eq!(alice.recv().await, "ROOM_CREATED:1");
    bob.send("SET_NAME:bob").await;
    bob.send("JOIN_ROOM:1").await;
    assert_eq!(
        alice.recv_n(4).await,
        vec!["JOIN_SUCCESS:1:1", "GAME_START:1", "PLAYER_INFO:1:alice:2:bob", "TURN:1"]
    );
    assert_eq!(
        bob.recv_n(4).await,
        vec!["JOIN_SUCCESS:1:2", "GAME_START:1", "PLAYER_INFO:1:alice:2:bob", "TURN:1"]
    );
    (alice, bob)
}

#[tokio::test]
async fn test_two_clients_play_to_a_diagonal_win() {
    let server = TestServer::start(ServerConfig::default()).await;
    let (mut alice, mut bob) = start_game(server.addr).await;

    for i in 1..=4 {
        alice.send(&format!("MAKE_MOVE:{i}:{i}")).await;
        assert_eq!(alice.recv_n(2).await, vec![format!("MOVE:{i}:{i}:1"), "TURN:2".into()]);
        assert_eq!(bob.recv_n(2).await, vec![format!("MOVE:{i}:{i}:1"), "TURN:2".into()]);

        bob.send(&format!("MAKE_MOVE:{i}:15")).await;
        assert_eq!(alice.recv_n(2).await, vec![format!("MOVE:{i}:15:2"), "TURN:1".into()]);
        assert_eq!(bob.recv_n(2).await, vec![format!("MOVE:{i}:15:2"), "TURN:1".into()]);
    }
    alice.send("MAKE_MOVE:5:5").await;

    assert_eq!(alice.recv_n(2).await, vec!["MOVE:5:5:1", "GAME_OVER:1"]);
    assert_eq!(bob.recv_n(2).await, vec!["MOVE:5:5:1", "GAME_OVER:1"]);

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_notifies_survivor() {
    let server = TestServer::start(ServerConfig::default()).await;
    let (mut alice, bob) = start_game(server.addr).await;

    drop(bob);

    assert_eq!(
        alice.recv_n(2).await,
        vec!["PLAYER_DISCONNECTED:2", "GAME_OVER:1"]
    );
    alice.send("LIST_ROOMS").await;
    assert_eq!(alice.recv().await, "ROOM_LIST:1|alice|FINISHED");

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_and_crlf_lines_keep_the_connection_open() {
    let server = TestServer::start(ServerConfig::default()).await;
    let mut client = TestClient::connect(server.addr).await;

    client.send("WHAT_IS_THIS").await;
    client.send("JOIN_ROOM:abc").await;
    client.send("MAKE_MOVE:1:1").await;
    client.send("LIST_ROOMS\r").await;

    assert_eq!(client.recv().await, "ROOM_LIST:EMPTY");
    server.stop().await;
}

#[tokio::test]
async fn test_over_long_line_is_ignored() {
    let config = ServerConfig {
        max_line_length: 32,
        ..ServerConfig::default()
    };
    let server = TestServer::start(config).await;
    let mut client = TestClient::connect(server.addr).await;

    client.send(&format!("SET_NAME:{}", "x".repeat(200))).await;
    client.send("CREATE_ROOM").await;
    client.send("LIST_ROOMS").await;

    assert_eq!(client.recv().await, "ROOM_CREATED:1");
    assert_eq!(client.recv().await, "ROOM_LIST:1|Player1|OPEN");
    server.stop().await;
}

#[tokio::test]
async fn test_idle_connection_is_closed_and_departs() {
    let config = ServerConfig {
        idle_timeout: Some(Duration::from_millis(300)),
        ..ServerConfig::default()
    };
    let server = TestServer::start(config).await;
    let mut client = TestClient::connect(server.addr).await;
    client.send("CREATE_ROOM").await;
    assert_eq!(client.recv().await, "ROOM_CREATED:1");

    assert!(client.is_closed().await);
    // Give the departure path a moment after the socket closes.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.registry.room_count().await, 0);
    assert_eq!(server.registry.session_count().await, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_open_connections() {
    let server = TestServer::start(ServerConfig::default()).await;
    let mut client = TestClient::connect(server.addr).await;
    client.send("LIST_ROOMS").await;
    assert_eq!(client.recv().await, "ROOM_LIST:EMPTY");

    let registry = Arc::clone(&server.registry);
    server.stop().await;

    assert!(client.is_closed().await);
    assert_eq!(registry.session_count().await, 0);
}

#[tokio::test]
async fn test_operator_broadcast_reaches_lobby_clients() {
    let server = TestServer::start(ServerConfig::default()).await;
    let mut client = TestClient::connect(server.addr).await;
    client.send("LIST_ROOMS").await;
    assert_eq!(client.recv().await, "ROOM_LIST:EMPTY");

    let delivered = server.registry.broadcast_all("maintenance at 22:00").await;

    assert_eq!(delivered, 1);
    assert_eq!(client.recv().await, "BROADCAST:maintenance at 22:00");
    server.stop().await;
}
