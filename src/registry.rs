use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::connection::ConnectionHandle;
use crate::dispatch;
use crate::error::ChatError;
use crate::protocol::ServerEvent;
use crate::room::Room;
use crate::types::{ConnectionId, RoomId};

/// Where a connection currently sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room: RoomId,
    pub username: String,
}

/// Process-wide room registry.
///
/// `rooms` is the primary map; `index` answers "which room is this
/// connection in" without scanning. Both are sharded maps, so rooms on
/// different shards never contend. Every mutation of a room happens
/// under that room's entry lock, which is also what makes create-on-join
/// and delete-on-empty atomic.
///
/// Lock order is always `rooms` then `index`; nothing holds an `index`
/// guard while touching `rooms`.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: DashMap<RoomId, Room>,
    index: DashMap<ConnectionId, Membership>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `conn` in `room_id` as `username`.
    ///
    /// Any previous membership is left first (with its `leave` notice).
    /// The joiner then gets a `join` ack and everyone else in the room a
    /// `join` notice.
    pub fn join(
        &self,
        room_id: RoomId,
        conn: &ConnectionHandle,
        username: &str,
    ) -> Result<(), ChatError> {
        self.leave(conn.id())?;

        let frame = ServerEvent::Join {
            username: username.to_string(),
        }
        .encode()?;

        let others = {
            let mut room = self.rooms.entry(room_id).or_default();
            room.insert(conn.clone(), username.to_string());
            self.index.insert(
                conn.id(),
                Membership {
                    room: room_id,
                    username: username.to_string(),
                },
            );
            // Queued under the room lock so no broadcast can reach the
            // joiner ahead of its ack. Delivery never blocks.
            dispatch::deliver(std::slice::from_ref(conn), &frame);
            room.recipients(Some(conn.id()))
        };

        dispatch::deliver(&others, &frame);

        info!(conn = %conn.id(), room = %room_id, username, "joined room");
        Ok(())
    }

    /// Take `conn` out of whatever room it is in. Returns that room, or
    /// `None` (and does nothing) if it wasn't in one.
    ///
    /// Remaining members get a `leave` notice; an emptied room is removed.
    pub fn leave(&self, conn: ConnectionId) -> Result<Option<RoomId>, ChatError> {
        let Some((_, membership)) = self.index.remove(&conn) else {
            return Ok(None);
        };

        let remaining = match self.rooms.entry(membership.room) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(conn);
                if entry.get().is_empty() {
                    entry.remove();
                    debug!(room = %membership.room, "room emptied, removed");
                    Vec::new()
                } else {
                    entry.get().recipients(None)
                }
            }
            Entry::Vacant(_) => Vec::new(),
        };

        info!(conn = %conn, room = %membership.room, username = %membership.username, "left room");

        if !remaining.is_empty() {
            let frame = ServerEvent::Leave {
                username: membership.username,
            }
            .encode()?;
            dispatch::deliver(&remaining, &frame);
        }

        Ok(Some(membership.room))
    }

    pub fn room_of(&self, conn: ConnectionId) -> Option<RoomId> {
        self.index.get(&conn).map(|m| m.room)
    }

    pub fn display_name_of(&self, conn: ConnectionId) -> Option<String> {
        self.index.get(&conn).map(|m| m.username.clone())
    }

    /// Room and display name in one lookup, for routing a message.
    pub fn membership(&self, conn: ConnectionId) -> Option<Membership> {
        self.index.get(&conn).map(|m| m.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Members of `room_id`; 0 if the room doesn't exist.
    pub fn member_count(&self, room_id: RoomId) -> usize {
        self.rooms.get(&room_id).map_or(0, |room| room.len())
    }

    pub fn contains(&self, room_id: RoomId, conn: ConnectionId) -> bool {
        self.rooms
            .get(&room_id)
            .is_some_and(|room| room.contains(conn))
    }

    /// Snapshot of open connections in `room_id` minus `exclude`.
    pub(crate) fn recipients(
        &self,
        room_id: RoomId,
        exclude: Option<ConnectionId>,
    ) -> Vec<ConnectionHandle> {
        self.rooms
            .get(&room_id)
            .map(|room| room.recipients(exclude))
            .unwrap_or_default()
    }
}
