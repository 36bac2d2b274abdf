use tracing::{trace, warn};

use crate::connection::{ConnectionHandle, Delivery};
use crate::error::ChatError;
use crate::protocol::{Frame, ServerEvent};
use crate::registry::Registry;
use crate::types::{ConnectionId, RoomId};

impl Registry {
    /// Send `event` to every open connection in `room_id` except
    /// `exclude`. Returns how many recipients it was queued for.
    ///
    /// The event is encoded once. Membership is snapshotted under the room
    /// lock and delivered after it is released; delivery never waits on a
    /// recipient.
    pub fn broadcast(
        &self,
        room_id: RoomId,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> Result<usize, ChatError> {
        let recipients = self.recipients(room_id, exclude);
        if recipients.is_empty() {
            return Ok(0);
        }
        let frame = event.encode()?;
        Ok(deliver(&recipients, &frame))
    }
}

/// Send `event` to a single connection, e.g. an error for its sender.
pub fn send_to(conn: &ConnectionHandle, event: &ServerEvent) -> Result<Delivery, ChatError> {
    let frame = event.encode()?;
    Ok(deliver_one(conn, frame))
}

/// Queue one shared frame on each recipient. Returns the number queued.
pub(crate) fn deliver(recipients: &[ConnectionHandle], frame: &Frame) -> usize {
    recipients
        .iter()
        .filter(|conn| deliver_one(conn, frame.clone()) == Delivery::Sent)
        .count()
}

fn deliver_one(conn: &ConnectionHandle, frame: Frame) -> Delivery {
    let outcome = conn.try_deliver(frame);
    match outcome {
        Delivery::Sent => {}
        Delivery::Dropped => warn!(conn = %conn.id(), "outbound queue full, dropping event"),
        // Disconnects race with broadcasts; the session cleans up.
        Delivery::Closed => trace!(conn = %conn.id(), "skipping closed connection"),
    }
    outcome
}
