use std::fmt;

/// A unique identifier for a live connection.
///
/// Wrapping `u64` in a newtype keeps connection ids from being mixed up
/// with other counters. Ids are allocated by the server and never reused
/// within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Length in bytes of a room identifier.
pub const ROOM_ID_LEN: usize = 32;

/// A room identifier: a SHA-256 digest derived from the room name and
/// its shared secret. See [`crate::identity::identify`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomId([u8; ROOM_ID_LEN]);

impl RoomId {
    pub fn from_bytes(bytes: [u8; ROOM_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Full lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Full hex digest. Room ids are opaque, so this is what shows up in logs.
impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Abbreviated: the first 8 bytes are plenty to tell rooms apart in a
/// debug dump.
impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({}…)", hex::encode(&self.0[..8]))
    }
}
