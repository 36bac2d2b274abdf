use sha2::{Digest, Sha256};

use crate::types::RoomId;

/// Derive the room identifier for a `(room name, secret)` pair.
///
/// Each field is hashed behind a big-endian `u64` length prefix, so no two
/// distinct pairs feed the same bytes into the digest (`("a:b", "c")` and
/// `("a", "b:c")` land in different rooms). Knowing the pair is the only
/// way into a room; there is no other access check.
pub fn identify(room_name: &str, secret: &str) -> RoomId {
    let mut hasher = Sha256::new();
    for field in [room_name, secret] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    RoomId::from_bytes(hasher.finalize().into())
}
