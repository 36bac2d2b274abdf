use std::collections::HashMap;

use crate::connection::ConnectionHandle;
use crate::types::ConnectionId;

/// One occupant of a room.
#[derive(Debug, Clone)]
pub struct Member {
    pub handle: ConnectionHandle,
    pub username: String,
}

/// A room's membership: connection -> display name.
///
/// Display names are not unique; two connections may both be "alice".
/// A `Room` only lives inside the registry while it has members.
#[derive(Debug, Default)]
pub struct Room {
    members: HashMap<ConnectionId, Member>,
}

impl Room {
    pub fn insert(&mut self, handle: ConnectionHandle, username: String) {
        self.members.insert(handle.id(), Member { handle, username });
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Member> {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Snapshot of the open connections to deliver to, minus `exclude`.
    ///
    /// Callers take this under the room lock and send after releasing it,
    /// so a member leaving mid-broadcast can't disturb the others.
    pub fn recipients(&self, exclude: Option<ConnectionId>) -> Vec<ConnectionHandle> {
        self.members
            .values()
            .filter(|m| Some(m.handle.id()) != exclude && m.handle.is_open())
            .map(|m| m.handle.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u64) -> (ConnectionHandle, tokio::sync::mpsc::Receiver<crate::protocol::Frame>) {
        ConnectionHandle::new(ConnectionId::new(id), 4)
    }

    #[test]
    fn duplicate_names_allowed() {
        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);
        let mut room = Room::default();
        room.insert(a, "alice".into());
        room.insert(b, "alice".into());
        assert_eq!(room.len(), 2);
    }

    #[test]
    fn recipients_skip_excluded_and_closed() {
        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);
        let (c, rc) = handle(3);
        drop(rc);

        let mut room = Room::default();
        room.insert(a, "a".into());
        room.insert(b, "b".into());
        room.insert(c, "c".into());

        let ids: Vec<_> = room
            .recipients(Some(ConnectionId::new(1)))
            .iter()
            .map(|h| h.id())
            .collect();
        assert_eq!(ids, vec![ConnectionId::new(2)]);
    }

    #[test]
    fn remove_reports_member() {
        let (a, _ra) = handle(1);
        let mut room = Room::default();
        room.insert(a, "a".into());
        let gone = room.remove(ConnectionId::new(1)).unwrap();
        assert_eq!(gone.username, "a");
        assert!(room.is_empty());
        assert!(room.remove(ConnectionId::new(1)).is_none());
    }
}
