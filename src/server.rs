use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{SinkExt, Stream, StreamExt};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::ConnectionHandle;
use crate::error::ChatError;
use crate::registry::Registry;
use crate::session::Session;
use crate::status;
use crate::types::ConnectionId;

/// How long a closing connection's writer gets to flush before it is cut.
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// State shared by every route.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<Registry>,
    next_conn_id: Arc<AtomicU64>,
    outbound_capacity: usize,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, outbound_capacity: usize) -> Self {
        Self {
            registry,
            next_conn_id: Arc::new(AtomicU64::new(0)),
            outbound_capacity,
        }
    }
}

/// Status routes plus the chat endpoint. WebSocket upgrades are accepted
/// on any path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(status::health))
        .fallback(fallback)
        .with_state(state)
}

async fn root(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept(ws, state),
        Err(_) => status::root_status(&state.registry).into_response(),
    }
}

async fn fallback(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept(ws, state),
        Err(_) => status::not_found().into_response(),
    }
}

fn accept(ws: WebSocketUpgrade, state: AppState) -> Response {
    let id = ConnectionId::new(state.next_conn_id.fetch_add(1, Ordering::Relaxed));
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_socket(socket, id, state.registry, state.outbound_capacity).await {
            warn!(conn = %id, error = %e, "connection ended with error");
        }
    })
}

pub struct Server {
    listener: TcpListener,
    state: AppState,
    idle_timeout: Duration,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ChatError> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        Ok(Self {
            listener,
            state: AppState::new(Arc::new(Registry::new()), config.outbound_capacity),
            idle_timeout: config.idle_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.state.registry.clone()
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), ChatError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ChatError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let app = router(self.state.clone());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    tokio::spawn(serve_connection(stream, peer, app.clone(), self.idle_timeout));
                }
            }
        }
    }
}

/// Hand one TCP connection to hyper. A peer that sends nothing within
/// `idle_timeout` is dropped before any HTTP work starts.
async fn serve_connection(stream: TcpStream, peer: SocketAddr, app: Router, idle_timeout: Duration) {
    match timeout(idle_timeout, stream.readable()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(%peer, error = %e, "connection failed before request");
            return;
        }
        Err(_) => {
            debug!(%peer, "no request within idle timeout, closing");
            return;
        }
    }

    let builder = Builder::new(TokioExecutor::new());
    let connection =
        builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(app));
    if let Err(e) = connection.await {
        debug!(%peer, error = %e, "http connection ended with error");
    }
}

/// Run a chat session over an upgraded WebSocket.
async fn handle_socket(
    socket: WebSocket,
    id: ConnectionId,
    registry: Arc<Registry>,
    capacity: usize,
) -> Result<(), ChatError> {
    let (mut sink, mut incoming) = socket.split();
    info!(conn = %id, "websocket connection established");

    // Writer task: drains this connection's queue into the socket. When it
    // exits the queue closes and broadcasts start skipping us.
    let (handle, mut rx) = ConnectionHandle::new(id, capacity);
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session::new(handle, registry);
    let result = read_loop(&mut session, &mut incoming).await;

    session.close()?;
    drop(session);
    info!(conn = %id, "websocket connection closed");

    if timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }

    result
}

async fn read_loop<S>(session: &mut Session, incoming: &mut S) -> Result<(), ChatError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(message) = incoming.next().await {
        match message? {
            Message::Text(text) => session.handle_text(text.as_str())?,
            Message::Binary(bytes) => session.handle_text(&String::from_utf8_lossy(&bytes))?,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    Ok(())
}
