//! Player event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers can catch up. The
//! player mirrors every listener notification onto the bus as a
//! [`PlayerEvent`].

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// PlayerEvent
// ---------------------------------------------------------------------------

/// What happened in the player. Positions are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    // -- Position ------------------------------------------------------------
    TimeUpdate {
        position: f64,
    },
    ThrottledTimeUpdate {
        position: f64,
    },
    MediaSeek {
        position: f64,
    },

    // -- Seek bracket --------------------------------------------------------
    VideoSeekStart,
    VideoSeek {
        position: f64,
    },
    VideoSeekEnd,

    // -- Transport -----------------------------------------------------------
    Play,
    Pause,
    Stop,
    Seek {
        position: f64,
    },

    // -- Lifecycle -----------------------------------------------------------
    VideoReady {
        duration: f64,
        phrase_count: usize,
        word_count: usize,
        char_count: usize,
    },
    TimerReady {
        clock: String,
    },
    Dispose,
}

impl PlayerEvent {
    /// The position carried by this event, if any.
    pub fn position(&self) -> Option<f64> {
        match self {
            PlayerEvent::TimeUpdate { position }
            | PlayerEvent::ThrottledTimeUpdate { position }
            | PlayerEvent::MediaSeek { position }
            | PlayerEvent::VideoSeek { position }
            | PlayerEvent::Seek { position } => Some(*position),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event was emitted (wall clock).
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: PlayerEvent,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: PlayerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: PlayerEvent) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
