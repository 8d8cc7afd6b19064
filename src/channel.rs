//! Room-scoped event pub/sub.
//!
//! One broadcast channel per room, single publisher (the authority),
//! so every subscriber observes events in publish order. No ordering
//! is guaranteed across rooms. A lagging subscriber sees a gap and is
//! expected to re-snapshot.

use crate::protocol::Event;
use crate::types::RoomCode;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 128;

/// Anything the state store publishes room events through. The real
/// transport is [`RoomChannels`]; tests swap in a [`RecordingSink`].
pub trait EventSink: Send + Sync {
    fn publish(&self, room: &str, event: Event);
}

/// Per-room broadcast registry backing the WebSocket endpoint.
pub struct RoomChannels {
    senders: Mutex<HashMap<RoomCode, broadcast::Sender<Event>>>,
}

impl RoomChannels {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a room's event stream, creating the channel if this
    /// is the first subscriber.
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<Event> {
        let mut senders = self.senders.lock().expect("channel registry poisoned");
        senders
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop a retired room's channel. Existing receivers observe a
    /// closed stream and disconnect.
    pub fn retire(&self, room: &str) {
        let mut senders = self.senders.lock().expect("channel registry poisoned");
        senders.remove(room);
    }
}

impl Default for RoomChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RoomChannels {
    fn publish(&self, room: &str, event: Event) {
        let senders = self.senders.lock().expect("channel registry poisoned");
        if let Some(tx) = senders.get(room) {
            // Ignore send errors (no receivers connected is fine)
            let _ = tx.send(event);
        }
    }
}

/// Test double that records every published event in order.
pub struct RecordingSink {
    events: Mutex<Vec<(RoomCode, Event)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Events published to one room, in publish order.
    pub fn for_room(&self, room: &str) -> Vec<Event> {
        self.events
            .lock()
            .expect("recording sink poisoned")
            .iter()
            .filter(|(r, _)| r == room)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("recording sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, room: &str, event: Event) {
        self.events
            .lock()
            .expect("recording sink poisoned")
            .push((room.to_string(), event));
    }
}
