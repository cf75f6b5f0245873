//! Outbound fact publishing
//!
//! The engine never talks to the transport directly. It publishes packets
//! through a `Broadcaster`, either to one connection or to everyone (minus an
//! optional exclusion). The UDP server supplies a channel-backed
//! implementation; tests use `RecordingBroadcaster`.

use shared::{ConnectionId, Packet};
use std::sync::{Arc, Mutex};

pub trait Broadcaster: Send {
    fn send_to(&self, connection: ConnectionId, packet: Packet);
    fn broadcast(&self, packet: Packet, exclude: Option<ConnectionId>);
}

/// Who a recorded packet was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Connection(ConnectionId),
    Everyone { exclude: Option<ConnectionId> },
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub audience: Audience,
    pub packet: Packet,
}

/// Keeps every published packet in memory. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingBroadcaster {
    sent: Arc<Mutex<Vec<Outbound>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<Outbound> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, audience: Audience, packet: Packet) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Outbound { audience, packet });
        }
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn send_to(&self, connection: ConnectionId, packet: Packet) {
        self.record(Audience::Connection(connection), packet);
    }

    fn broadcast(&self, packet: Packet, exclude: Option<ConnectionId>) {
        self.record(Audience::Everyone { exclude }, packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_broadcaster() {
        let recorder = RecordingBroadcaster::new();
        let handle = recorder.clone();

        recorder.send_to(3, Packet::Heartbeat);
        recorder.broadcast(Packet::Leave, Some(3));
        assert_eq!(handle.len(), 2);

        let sent = handle.drain();
        assert_eq!(sent[0].audience, Audience::Connection(3));
        assert_eq!(sent[1].audience, Audience::Everyone { exclude: Some(3) });
        assert!(matches!(sent[1].packet, Packet::Leave));
        assert!(recorder.is_empty());
    }
}
