use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use termchat_server::{Registry, Server, ServerConfig, ServerEvent, identify};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

async fn start() -> (SocketAddr, Arc<Registry>) {
    start_with(ServerConfig::builder().addr("127.0.0.1").port(0).build()).await
}

async fn start_with(config: ServerConfig) -> (SocketAddr, Arc<Registry>) {
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(server.run());
    (addr, registry)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

async fn send(client: &mut Client, value: Value) {
    client
        .send(Message::text(value.to_string()))
        .await
        .unwrap();
}

async fn join(client: &mut Client, username: &str) {
    send(
        client,
        json!({"type": "join", "username": username, "chatname": "lobby", "password": "secret"}),
    )
    .await;
}

async fn recv(client: &mut Client) -> ServerEvent {
    loop {
        let message = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_quiet(client: &mut Client) {
    let next = timeout(QUIET_PERIOD, client.next()).await;
    assert!(next.is_err(), "unexpected event: {next:?}");
}

async fn wait_for_rooms(registry: &Registry, expected: usize) {
    for _ in 0..100 {
        if registry.room_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(registry.room_count(), expected);
}

fn joined(username: &str) -> ServerEvent {
    ServerEvent::Join {
        username: username.into(),
    }
}

fn error(message: &str) -> ServerEvent {
    ServerEvent::Error {
        message: message.into(),
    }
}

#[tokio::test]
async fn lobby_conversation() {
    let (addr, registry) = start().await;
    let lobby = identify("lobby", "secret");

    let mut alice = connect(addr).await;
    join(&mut alice, "Alice").await;
    assert_eq!(recv(&mut alice).await, joined("Alice"));
    assert_quiet(&mut alice).await;

    let mut bob = connect(addr).await;
    join(&mut bob, "Bob").await;
    assert_eq!(recv(&mut bob).await, joined("Bob"));
    assert_eq!(recv(&mut alice).await, joined("Bob"));
    assert_eq!(registry.member_count(lobby), 2);

    send(&mut alice, json!({"type": "message", "content": "hi"})).await;
    let expected = ServerEvent::Message {
        username: "Alice".into(),
        content: "hi".into(),
    };
    assert_eq!(recv(&mut alice).await, expected);
    assert_eq!(recv(&mut bob).await, expected);

    bob.close(None).await.unwrap();
    assert_eq!(
        recv(&mut alice).await,
        ServerEvent::Leave {
            username: "Bob".into()
        }
    );
    assert_eq!(registry.member_count(lobby), 1);
    assert_eq!(registry.room_count(), 1);

    alice.close(None).await.unwrap();
    wait_for_rooms(&registry, 0).await;
}

#[tokio::test]
async fn errors_go_to_sender_only() {
    let (addr, registry) = start().await;

    let mut alice = connect(addr).await;
    send(&mut alice, json!({"type": "message", "content": "hi"})).await;
    assert_eq!(
        recv(&mut alice).await,
        error("You must join a room before sending messages")
    );
    assert_eq!(registry.room_count(), 0);

    join(&mut alice, "Alice").await;
    recv(&mut alice).await;

    let mut bob = connect(addr).await;
    join(&mut bob, "Bob").await;
    recv(&mut bob).await;
    recv(&mut alice).await;

    send(&mut bob, json!({"type": "message", "content": "  "})).await;
    assert_eq!(recv(&mut bob).await, error("Message content cannot be empty"));

    bob.send(Message::text("this is not json")).await.unwrap();
    assert_eq!(recv(&mut bob).await, error("Invalid message format"));

    send(&mut bob, json!({"type": "join", "username": "Bob"})).await;
    assert_eq!(
        recv(&mut bob).await,
        error("Username, chatname, and password are required")
    );

    send(&mut bob, json!({"type": "typing"})).await;
    assert_quiet(&mut bob).await;
    assert_quiet(&mut alice).await;
}

#[tokio::test]
async fn rejoining_moves_between_rooms() {
    let (addr, registry) = start().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "Alice").await;
    recv(&mut alice).await;

    let mut bob = connect(addr).await;
    join(&mut bob, "Bob").await;
    recv(&mut bob).await;
    recv(&mut alice).await;

    send(
        &mut bob,
        json!({"type": "join", "username": "Bob", "chatname": "side", "password": "secret"}),
    )
    .await;
    assert_eq!(recv(&mut bob).await, joined("Bob"));
    assert_eq!(
        recv(&mut alice).await,
        ServerEvent::Leave {
            username: "Bob".into()
        }
    );
    assert_eq!(registry.room_count(), 2);

    send(&mut bob, json!({"type": "message", "content": "anyone?"})).await;
    recv(&mut bob).await;
    assert_quiet(&mut alice).await;
}

#[tokio::test]
async fn status_endpoints() {
    let (addr, _registry) = start().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "Alice").await;
    recv(&mut alice).await;

    let body = http_get(addr, "/").await;
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["activeRooms"], 1);

    let body = http_get(addr, "/health").await;
    assert_eq!(body, r#"{"status":"healthy"}"#);
}

#[tokio::test]
async fn silent_connection_is_dropped() {
    let config = ServerConfig::builder()
        .addr("127.0.0.1")
        .port(0)
        .idle_timeout(Duration::from_millis(200))
        .build();
    let (addr, registry) = start_with(config).await;

    let mut silent = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = timeout(RECV_TIMEOUT, silent.read(&mut buf))
        .await
        .expect("idle connection was never closed");
    assert!(matches!(read, Ok(0) | Err(_)), "{read:?}");

    // Other clients are unaffected.
    let mut alice = connect(addr).await;
    join(&mut alice, "Alice").await;
    assert_eq!(recv(&mut alice).await, joined("Alice"));
    assert_eq!(registry.room_count(), 1);

    let body = http_get(addr, "/health").await;
    assert_eq!(body, r#"{"status":"healthy"}"#);
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let mut response = String::new();
    timeout(RECV_TIMEOUT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    body.to_string()
}
