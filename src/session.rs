use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::ConnectionHandle;
use crate::dispatch;
use crate::error::ChatError;
use crate::identity::identify;
use crate::protocol::{Inbound, JoinRequest, ServerEvent, parse_inbound};
use crate::registry::Registry;
use crate::types::{ConnectionId, RoomId};

/// Where a session is in its lifecycle.
///
///   Unjoined -> Joined -> Closed
///
/// `Joined` can be re-entered by joining again (possibly another room).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined { room: RoomId, username: String },
    Closed,
}

/// Per-connection protocol handler. Transport-agnostic: the server feeds
/// it text frames and tells it when the connection is gone.
pub struct Session {
    conn: ConnectionHandle,
    registry: Arc<Registry>,
    state: SessionState,
}

impl Session {
    pub fn new(conn: ConnectionHandle, registry: Arc<Registry>) -> Self {
        Self {
            conn,
            registry,
            state: SessionState::Unjoined,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle one inbound text frame.
    ///
    /// Protocol errors go back to this connection only and leave the state
    /// alone. An `Err` here is an internal failure, not a client mistake.
    pub fn handle_text(&mut self, text: &str) -> Result<(), ChatError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        let outcome = parse_inbound(text).and_then(|inbound| match inbound {
            Inbound::Join(request) => self.join(request),
            Inbound::Message { content } => self.message(content),
            Inbound::Unknown => {
                debug!(conn = %self.id(), "ignoring unrecognized event type");
                Ok(())
            }
        });

        match outcome {
            Err(err) if err.is_client_facing() => {
                if let ChatError::Malformed(source) = &err {
                    warn!(conn = %self.id(), error = %source, "malformed frame");
                }
                dispatch::send_to(&self.conn, &ServerEvent::error(&err))?;
                Ok(())
            }
            other => other,
        }
    }

    /// The transport closed or failed. Safe to call more than once, and on
    /// a session that never joined.
    pub fn close(&mut self) -> Result<(), ChatError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        self.registry.leave(self.id())?;
        Ok(())
    }

    fn join(&mut self, request: JoinRequest) -> Result<(), ChatError> {
        let room = identify(&request.chatname, &request.password);
        self.registry.join(room, &self.conn, &request.username)?;
        debug!(conn = %self.id(), chatname = %request.chatname, "session joined");
        self.state = SessionState::Joined {
            room,
            username: request.username,
        };
        Ok(())
    }

    fn message(&mut self, content: String) -> Result<(), ChatError> {
        let Some(membership) = self.registry.membership(self.id()) else {
            return Err(ChatError::NotJoined);
        };

        debug!(conn = %self.id(), room = %membership.room, username = %membership.username, "routing message");

        // The sender is a member too, so it gets its own message back.
        self.registry.broadcast(
            membership.room,
            &ServerEvent::Message {
                username: membership.username,
                content,
            },
            None,
        )?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(conn = %self.id(), error = %err, "cleanup on drop failed");
        }
    }
}
