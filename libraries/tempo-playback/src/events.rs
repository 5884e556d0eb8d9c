//! Playback Events
//!
//! Two event vocabularies meet here:
//! - [`PlatformEvent`]: what the audio resource reports to the engine
//! - [`PlaybackEvent`]: what the engine publishes to its observers (the
//!   playback service, UI bindings)
//!
//! Observers register through a single [`EventObserver`] interface and get an
//! [`ObserverId`] back for unsubscribing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Signals raised by the platform audio resource
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    /// Metadata loaded, duration known (seconds)
    DurationChange(f64),

    /// Enough data buffered to start playback
    CanPlay,

    /// Playback paused, requested or not
    Pause,

    /// Periodic position report (seconds)
    TimeUpdate(f64),

    /// Reached the end of the source
    Ended,

    /// Media error
    Error(String),
}

/// Events published by the engine for UI synchronization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Position update
    TimeUpdate {
        /// Current position in seconds
        current_time: f64,
    },

    /// Duration became known or changed
    DurationChange {
        /// Track duration in seconds
        duration: f64,
    },

    /// Track finished playing naturally
    Ended,

    /// Error occurred during playback
    Error {
        /// Error message
        message: String,
    },

    /// Source is ready to play
    CanPlay,
}

/// Receives engine events
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &PlaybackEvent);
}

/// Observer that forwards events into a tokio channel
///
/// Lets an async owner (the playback service) react to events from its own
/// task instead of inside the dispatch call.
pub struct ChannelObserver {
    sender: UnboundedSender<PlaybackEvent>,
}

impl ChannelObserver {
    pub fn new(sender: UnboundedSender<PlaybackEvent>) -> Self {
        Self { sender }
    }
}

impl EventObserver for ChannelObserver {
    fn on_event(&self, event: &PlaybackEvent) {
        // Receiver gone means the owner shut down; nothing left to notify.
        let _ = self.sender.send(event.clone());
    }
}

/// Handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registered observers, in subscription order
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(ObserverId, Arc<dyn EventObserver>)>,
}

impl ObserverRegistry {
    pub(crate) fn subscribe(&mut self, observer: Arc<dyn EventObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.observers.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    /// Snapshot for dispatching outside the engine lock
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn EventObserver>> {
        self.observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}
