//! Group chat relay.
//!
//! Clients connect over WebSocket, join a room named by a
//! `(chatname, password)` pair, and every message is relayed to all
//! occupants of that room. Rooms exist only while someone is in them.
//!
//! The interesting parts are [`Registry`] (who is in which room) and
//! [`Session`] (the per-connection protocol). [`Server`] is the TCP and
//! WebSocket plumbing around them.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod status;
pub mod types;

pub use config::ServerConfig;
pub use connection::ConnectionHandle;
pub use error::ChatError;
pub use identity::identify;
pub use protocol::{Inbound, ServerEvent, parse_inbound};
pub use registry::{Membership, Registry};
pub use server::Server;
pub use session::{Session, SessionState};
pub use types::{ConnectionId, RoomId};
