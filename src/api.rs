//! Application-facing location capture API.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::capture::{
    select_event_channel, CaptureConfiguration, CaptureEngine, CaptureError, EventEmitter,
    Listener, Platform, Result, Subscription, LOCATION_RECEIVED,
};
use crate::location::{Anchor, CapturedLocation, RetrieveResult};

/// Callback invoked when the engine reports a new location.
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Single-slot holder for the registered notifier.
#[derive(Default)]
struct NotifierSlot {
    current: Mutex<Option<Notifier>>,
}

impl NotifierSlot {
    fn replace(&self, notifier: Option<Notifier>) {
        match self.current.lock() {
            Ok(mut slot) => *slot = notifier,
            Err(poisoned) => *poisoned.into_inner() = notifier,
        }
    }

    fn is_set(&self) -> bool {
        self.current.lock().map_or(false, |slot| slot.is_some())
    }

    fn fire(&self) {
        // Clone out so the notifier can replace itself without deadlocking.
        let notifier = self.current.lock().ok().and_then(|slot| slot.clone());
        if let Some(notifier) = notifier {
            notifier();
        }
    }
}

/// Platform-independent entry point for location capture.
///
/// Forwards every command to the underlying [`CaptureEngine`] and relays its
/// result unchanged. Engine notifications arrive on whichever event channel
/// the platform uses and are delivered to the single registered notifier.
///
/// Construct one instance at application startup and pass it to the code
/// that needs it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use location_capture_core::{EventEmitter, LocationCapture, Platform};
///
/// let device_events = Arc::new(EventEmitter::new());
/// let capture = LocationCapture::new(Platform::Android, None, &device_events);
///
/// capture.set_notifier(Some(Arc::new(|| println!("new location"))));
/// assert!(capture.has_notifier());
/// ```
pub struct LocationCapture {
    platform: Platform,
    engine: Option<Arc<dyn CaptureEngine>>,
    notifier: Arc<NotifierSlot>,
    subscription: Option<Subscription>,
}

impl fmt::Debug for LocationCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationCapture")
            .field("platform", &self.platform)
            .field("has_engine", &self.engine.is_some())
            .field("has_notifier", &self.notifier.is_set())
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl LocationCapture {
    /// Creates the capture service for `platform`.
    ///
    /// Subscribes exactly one `location_received` listener on the channel
    /// the platform uses: the engine's own emitter on iOS, `device_events`
    /// on Android. Other platforms get no subscription.
    #[must_use]
    pub fn new(
        platform: Platform,
        engine: Option<Arc<dyn CaptureEngine>>,
        device_events: &Arc<EventEmitter>,
    ) -> Self {
        let notifier = Arc::new(NotifierSlot::default());

        let subscription =
            select_event_channel(platform, engine.as_deref(), device_events).map(|channel| {
                log::debug!("Listening for {LOCATION_RECEIVED} on the {} channel", channel.name());
                let slot = Arc::clone(&notifier);
                let handler: Listener = Arc::new(move || slot.fire());
                channel.subscribe(LOCATION_RECEIVED, handler)
            });

        if engine.is_none() {
            log::warn!("No location capture engine on {platform}");
        }

        Self {
            platform,
            engine,
            notifier,
            subscription,
        }
    }

    /// Creates the capture service for the platform this binary targets.
    #[must_use]
    pub fn for_current_platform(
        engine: Option<Arc<dyn CaptureEngine>>,
        device_events: &Arc<EventEmitter>,
    ) -> Self {
        Self::new(Platform::current(), engine, device_events)
    }

    /// Returns the platform this service was created for.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Returns whether an event subscription is active.
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    fn engine(&self) -> Result<&Arc<dyn CaptureEngine>> {
        self.engine.as_ref().ok_or(CaptureError::EngineUnavailable)
    }

    /// Requests the current location, independent of any ongoing capture.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EngineUnavailable`] without an engine, or
    /// whatever error the engine reports.
    pub async fn get_current(&self) -> Result<CapturedLocation> {
        self.engine()?.get_current().await
    }

    /// Forwards `config` to the engine unchanged.
    ///
    /// Whether the engine accepts the configuration is not reported.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EngineUnavailable`] without an engine.
    pub async fn configure(&self, config: CaptureConfiguration) -> Result<()> {
        self.engine()?.configure(config).await;
        Ok(())
    }

    /// Registers the notifier, replacing any previous one. `None` clears it.
    pub fn set_notifier(&self, notifier: Option<Notifier>) {
        self.notifier.replace(notifier);
    }

    /// Returns whether a notifier is registered.
    #[must_use]
    pub fn has_notifier(&self) -> bool {
        self.notifier.is_set()
    }

    /// Asks the engine to begin capturing.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EngineUnavailable`] without an engine, or
    /// whatever error the engine reports.
    pub async fn start(&self) -> Result<()> {
        self.engine()?.start().await
    }

    /// Asks the engine to stop capturing.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EngineUnavailable`] without an engine, or
    /// whatever error the engine reports.
    pub async fn stop(&self) -> Result<()> {
        self.engine()?.stop().await
    }

    /// Retrieves up to `limit` locations after `anchor`.
    ///
    /// Both arguments reach the engine unchanged and its page is returned
    /// unchanged. Call again with `next_anchor` for the following page.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EngineUnavailable`] without an engine, or
    /// whatever error the engine reports.
    pub async fn retrieve(&self, anchor: Option<Anchor>, limit: Option<u32>) -> Result<RetrieveResult> {
        self.engine()?.retrieve(anchor, limit).await
    }

    /// Returns the anchor for the most recently captured location.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EngineUnavailable`] without an engine, or
    /// whatever error the engine reports.
    pub async fn get_latest_anchor(&self) -> Result<Anchor> {
        self.engine()?.get_latest_anchor().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_notifier() -> (Arc<AtomicUsize>, Notifier) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (
            count,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    fn android() -> (Arc<EventEmitter>, LocationCapture) {
        let device = Arc::new(EventEmitter::new());
        let capture = LocationCapture::new(Platform::Android, None, &device);
        (device, capture)
    }

    #[test]
    fn new_service_has_no_notifier() {
        let (_, capture) = android();
        assert!(!capture.has_notifier());
    }

    #[test]
    fn android_subscribes_once_on_device_channel() {
        let (device, capture) = android();
        assert!(capture.is_listening());
        assert_eq!(device.listener_count(LOCATION_RECEIVED), 1);
    }

    #[test]
    fn unsupported_platform_does_not_listen() {
        let device = Arc::new(EventEmitter::new());
        let capture = LocationCapture::new(Platform::Unsupported, None, &device);
        assert!(!capture.is_listening());
        assert_eq!(device.listener_count(LOCATION_RECEIVED), 0);
    }

    #[test]
    fn event_fires_registered_notifier() {
        let (device, capture) = android();
        let (count, notifier) = counting_notifier();

        capture.set_notifier(Some(notifier));
        device.emit(LOCATION_RECEIVED);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_without_notifier_is_harmless() {
        let (device, _capture) = android();
        assert_eq!(device.emit(LOCATION_RECEIVED), 1);
    }

    #[test]
    fn last_notifier_wins() {
        let (device, capture) = android();
        let (first_count, first) = counting_notifier();
        let (second_count, second) = counting_notifier();

        capture.set_notifier(Some(first));
        capture.set_notifier(Some(second));
        device.emit(LOCATION_RECEIVED);

        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clearing_notifier_stops_delivery() {
        let (device, capture) = android();
        let (count, notifier) = counting_notifier();

        capture.set_notifier(Some(notifier));
        capture.set_notifier(None);
        device.emit(LOCATION_RECEIVED);

        assert!(!capture.has_notifier());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_service_unsubscribes() {
        let (device, capture) = android();
        drop(capture);
        assert_eq!(device.listener_count(LOCATION_RECEIVED), 0);
    }

    #[tokio::test]
    async fn commands_without_engine_fail() {
        let (_, capture) = android();

        assert!(matches!(
            capture.get_current().await,
            Err(CaptureError::EngineUnavailable)
        ));
        assert!(matches!(
            capture.configure(CaptureConfiguration::new()).await,
            Err(CaptureError::EngineUnavailable)
        ));
        assert!(matches!(
            capture.start().await,
            Err(CaptureError::EngineUnavailable)
        ));
        assert!(matches!(
            capture.stop().await,
            Err(CaptureError::EngineUnavailable)
        ));
        assert!(matches!(
            capture.retrieve(None, Some(10)).await,
            Err(CaptureError::EngineUnavailable)
        ));
        assert!(matches!(
            capture.get_latest_anchor().await,
            Err(CaptureError::EngineUnavailable)
        ));
    }

    #[test]
    fn debug_trait_implementation() {
        let (_, capture) = android();
        let debug_str = format!("{capture:?}");
        assert!(debug_str.contains("LocationCapture"));
        assert!(debug_str.contains("Android"));
        assert!(debug_str.contains("has_engine: false"));
    }
}
