//! Event delivery from capture engines.
//!
//! Engines signal new data by emitting [`LOCATION_RECEIVED`] on an
//! [`EventEmitter`]. Which emitter carries the event depends on the
//! platform:
//!
//! - **iOS**: the engine module owns its emitter
//!   ([`ModuleEventChannel`])
//! - **Android**: events go through the process-wide device emitter
//!   ([`DeviceEventChannel`])
//!
//! [`select_event_channel`] picks one once at startup so call sites never
//! branch on the platform.

// Listener maps are held only while cloning or mutating; callbacks never run
// under the lock.
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::engine::CaptureEngine;
use super::platform::Platform;

/// Event emitted (without payload) whenever the engine has stored a new
/// location.
pub const LOCATION_RECEIVED: &str = "location_received";

/// Callback invoked when an event is emitted.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Named-event emitter with synchronous delivery.
///
/// Listeners run on the emitting task, in registration order.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<String> = self
            .listeners
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("EventEmitter")
            .field("events", &events)
            .finish()
    }
}

impl EventEmitter {
    /// Creates an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `event`.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::remove`] is called.
    pub fn add_listener(self: &Arc<Self>, event: &str, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.listeners.lock() {
            map.entry(event.to_string())
                .or_default()
                .push((id, listener));
        }
        Subscription {
            emitter: Arc::clone(self),
            event: event.to_string(),
            id,
            active: true,
        }
    }

    /// Invokes every listener registered for `event`.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &str) -> usize {
        let listeners: Vec<Listener> = match self.listeners.lock() {
            Ok(map) => map
                .get(event)
                .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default(),
            Err(e) => {
                log::warn!("Event emitter lock poisoned, dropping {event}: {e}");
                return 0;
            }
        };

        for listener in &listeners {
            listener();
        }
        listeners.len()
    }

    /// Returns the number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .map(|map| map.get(event).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn remove_listener(&self, event: &str, id: u64) {
        if let Ok(mut map) = self.listeners.lock() {
            if let Some(entries) = map.get_mut(event) {
                entries.retain(|(entry_id, _)| *entry_id != id);
                if entries.is_empty() {
                    map.remove(event);
                }
            }
        }
    }
}

/// Handle for a registered listener. Dropping it unregisters the listener.
pub struct Subscription {
    emitter: Arc<EventEmitter>,
    event: String,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Returns the event this subscription listens for.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Unregisters the listener now.
    pub fn remove(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if self.active {
            self.emitter.remove_listener(&self.event, self.id);
            self.active = false;
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A platform-specific path by which engine events reach application code.
pub trait EventChannel: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Registers `handler` for `event` on this channel.
    fn subscribe(&self, event: &str, handler: Listener) -> Subscription;
}

/// Channel that listens on the engine module's own emitter (iOS).
#[derive(Debug, Clone)]
pub struct ModuleEventChannel {
    emitter: Arc<EventEmitter>,
}

impl ModuleEventChannel {
    /// Binds to the emitter owned by an engine module.
    #[must_use]
    pub const fn new(emitter: Arc<EventEmitter>) -> Self {
        Self { emitter }
    }
}

impl EventChannel for ModuleEventChannel {
    fn name(&self) -> &'static str {
        "module"
    }

    fn subscribe(&self, event: &str, handler: Listener) -> Subscription {
        self.emitter.add_listener(event, handler)
    }
}

/// Channel that listens on the process-wide device emitter (Android).
#[derive(Debug, Clone)]
pub struct DeviceEventChannel {
    emitter: Arc<EventEmitter>,
}

impl DeviceEventChannel {
    /// Binds to the process-wide device emitter.
    #[must_use]
    pub const fn new(emitter: Arc<EventEmitter>) -> Self {
        Self { emitter }
    }
}

impl EventChannel for DeviceEventChannel {
    fn name(&self) -> &'static str {
        "device"
    }

    fn subscribe(&self, event: &str, handler: Listener) -> Subscription {
        self.emitter.add_listener(event, handler)
    }
}

/// Picks the event channel for `platform`.
///
/// Returns `None` on platforms without a capture engine event path, and on
/// iOS when no engine module is present to own an emitter.
#[must_use]
pub fn select_event_channel(
    platform: Platform,
    engine: Option<&dyn CaptureEngine>,
    device_events: &Arc<EventEmitter>,
) -> Option<Box<dyn EventChannel>> {
    match platform {
        Platform::Ios => engine
            .map(|engine| Box::new(ModuleEventChannel::new(engine.events())) as Box<dyn EventChannel>),
        Platform::Android => Some(Box::new(DeviceEventChannel::new(Arc::clone(device_events)))),
        Platform::Unsupported => None,
    }
}
