//! Robustness tests for the chat daemon.
//!
//! These tests verify the daemon handles edge cases and error conditions gracefully:
//! - Slow or stuck consumers
//! - Disconnects mid-handshake and mid-command
//! - Racing unregisters
//! - Malformed input
//! - Rapid connect/disconnect
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::SocketAddr;
use std::time::Duration;

use linechatd::client::{ClientHandle, ClientId};
use linechatd::outbound::{mailbox, MailboxReceiver};
use linechatd::registry::{spawn_registry, RegistryHandle};
use linechatd::server::{ChatServer, ConnectionSettings};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const LINE_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    cancel_token: CancellationToken,
    registry: RegistryHandle,
}

impl TestServer {
    async fn spawn() -> Self {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(
            "127.0.0.1:0",
            registry.clone(),
            cancel_token.clone(),
            ConnectionSettings::default(),
        )
        .await
        .expect("bind loopback");
        let addr = server.local_addr();

        tokio::spawn(async move { server.run().await });

        Self {
            addr,
            cancel_token,
            registry,
        }
    }

    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        TestClient {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.expect("Enter username:").await;
        client.send(name).await;
        client.expect("OK").await;
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self.registry.stop();
    }
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write");
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
    }

    async fn next_line(&mut self) -> Option<String> {
        timeout(LINE_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read")
    }

    async fn expect(&mut self, expected: &str) {
        assert_eq!(self.next_line().await.as_deref(), Some(expected));
    }

    async fn expect_silence(&mut self) {
        let result = timeout(QUIET_PERIOD, self.lines.next_line()).await;
        assert!(result.is_err(), "unexpected line: {result:?}");
    }
}

fn mailbox_client(id: u64, capacity: usize) -> (ClientHandle, MailboxReceiver) {
    let (mb, rx) = mailbox(capacity);
    (ClientHandle::new(ClientId::new(id), mb), rx)
}

// ============================================================================
// Slow Consumer Tests
// ============================================================================

#[tokio::test]
async fn test_stuck_mailbox_does_not_stall_registry() {
    let registry = spawn_registry();

    // Never drained
    let (stuck, _stuck_rx) = mailbox_client(1, 2);
    let (alice, mut alice_rx) = mailbox_client(2, 8);

    registry.register(&stuck, "stuck").await.unwrap();
    registry.register(&alice, "alice").await.unwrap();
    assert_eq!(alice_rx.recv().await.as_deref(), Some("OK"));

    for i in 0..200 {
        registry.broadcast(&alice, format!("line {i}")).await.unwrap();
        let line = timeout(LINE_TIMEOUT, alice_rx.recv())
            .await
            .expect("registry stalled behind a full mailbox");
        assert_eq!(line, Some(format!("alice: line {i}")));
    }
}

#[tokio::test]
async fn test_silent_tcp_client_does_not_block_others() {
    let server = TestServer::spawn().await;

    let mut a = server.join("alice").await;
    let mut b = server.join("bob").await;
    a.expect("SYSTEM: bob joined").await;

    // Joins, then never reads again
    let _silent = server.join("lurker").await;
    a.expect("SYSTEM: lurker joined").await;
    b.expect("SYSTEM: lurker joined").await;

    for i in 0..100 {
        a.send(&format!("ping {i}")).await;
        a.expect(&format!("alice: ping {i}")).await;
        b.expect(&format!("alice: ping {i}")).await;
    }
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_disconnect_during_handshake_leaves_no_trace() {
    let server = TestServer::spawn().await;

    let mut a = server.join("alice").await;

    let mut ghost = server.connect().await;
    ghost.expect("Enter username:").await;
    drop(ghost);

    // Half a username, then gone
    let mut partial = server.connect().await;
    partial.expect("Enter username:").await;
    partial.send_raw(b"bo").await;
    drop(partial);

    a.expect_silence().await;
    a.send("/users").await;
    a.expect("USERS: alice").await;
}

#[tokio::test]
async fn test_partial_line_then_disconnect_is_delivered() {
    let server = TestServer::spawn().await;

    let mut a = server.join("alice").await;
    let mut b = server.join("bob").await;
    a.expect("SYSTEM: bob joined").await;

    // Unterminated final line is still a message
    b.send_raw(b"see you").await;
    drop(b);

    a.expect("bob: see you").await;
    a.expect("SYSTEM: bob left").await;
}

#[tokio::test]
async fn test_exit_then_immediate_close() {
    let server = TestServer::spawn().await;

    let mut a = server.join("alice").await;
    let mut b = server.join("bob").await;
    a.expect("SYSTEM: bob joined").await;

    b.send_raw(b"/exit\n").await;
    drop(b);

    // Exactly one departure notice
    a.expect("SYSTEM: bob left").await;
    a.expect_silence().await;
}

#[tokio::test]
async fn test_concurrent_unregister_single_notice() {
    let registry = spawn_registry();

    let (alice, mut alice_rx) = mailbox_client(1, 16);
    let (bob, _bob_rx) = mailbox_client(2, 16);
    registry.register(&alice, "alice").await.unwrap();
    registry.register(&bob, "bob").await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        let bob = bob.clone();
        tasks.push(tokio::spawn(async move { registry.unregister(&bob).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Flush: this reply is queued after every unregister was handled
    registry.list_users(&alice).await.unwrap();

    let mut lines = Vec::new();
    while let Ok(Some(line)) = timeout(QUIET_PERIOD, alice_rx.recv()).await {
        lines.push(line);
    }
    assert_eq!(
        lines,
        vec!["OK", "SYSTEM: bob joined", "SYSTEM: bob left", "USERS: alice"]
    );
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[tokio::test]
async fn test_invalid_utf8_disconnects_client() {
    let server = TestServer::spawn().await;

    let mut a = server.join("alice").await;
    let mut b = server.join("bob").await;
    a.expect("SYSTEM: bob joined").await;

    b.send_raw(&[0xff, 0xfe, b'\n']).await;

    a.expect("SYSTEM: bob left").await;
}

#[tokio::test]
async fn test_slash_words_chat_unless_whisper_prefixed() {
    let server = TestServer::spawn().await;

    let mut a = server.join("alice").await;

    a.send("/wave").await;
    a.expect("ERR whisper_usage").await;
    a.send("/wbob hi").await;
    a.expect("ERR whisper_usage").await;
    a.send("/me waves").await;
    a.expect("alice: /me waves").await;
    a.send("/USERS").await;
    a.expect("alice: /USERS").await;
}

#[tokio::test]
async fn test_pipelined_commands_keep_order() {
    let server = TestServer::spawn().await;

    let mut a = server.join("alice").await;
    a.send_raw(b"one\ntwo\n/users\nthree\n").await;

    a.expect("alice: one").await;
    a.expect("alice: two").await;
    a.expect("USERS: alice").await;
    a.expect("alice: three").await;
}

// ============================================================================
// Connection Churn Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    for _ in 0..50 {
        let stream = TcpStream::connect(server.addr).await.expect("connect");
        drop(stream);
    }

    let mut a = server.join("alice").await;
    a.send("/users").await;
    a.expect("USERS: alice").await;
}

#[tokio::test]
async fn test_many_clients_see_each_other() {
    let server = TestServer::spawn().await;

    let mut clients = Vec::new();
    for i in 0..10 {
        clients.push(server.join(&format!("user{i:02}")).await);
    }

    let last = clients.last_mut().unwrap();
    last.send("/users").await;

    let expected: Vec<String> = (0..10).map(|i| format!("user{i:02}")).collect();
    assert_eq!(
        last.next_line().await,
        Some(format!("USERS: {}", expected.join(",")))
    );
}
