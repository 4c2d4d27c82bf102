//! Reusable test doubles for capture integration tests.
//!
//! - [`RecordingEngine`]: a `CaptureEngine` that records every command and
//!   replays scripted results
//! - [`ChannelProvider`]: a `LocationProvider` whose fixes are pushed by
//!   the test
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use location_capture_core::engine::LocationProvider;
use location_capture_core::{
    Anchor, CaptureConfiguration, CaptureEngine, CaptureError, CapturedLocation, EventEmitter,
    Result, RetrieveResult,
};
use tokio::sync::mpsc;

/// Atomic counter for unique fixture timestamps.
static FIX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A command observed by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetCurrent,
    Configure(CaptureConfiguration),
    Start,
    Stop,
    Retrieve(Option<Anchor>, Option<u32>),
    GetLatestAnchor,
}

/// Engine double that records commands and returns canned results.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<Call>>,
    events: Arc<EventEmitter>,
    current: Mutex<Option<CapturedLocation>>,
    page: Mutex<Option<RetrieveResult>>,
    latest: Mutex<Option<Anchor>>,
    start_error: Mutex<Option<CaptureError>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_current(&self, location: CapturedLocation) {
        *self.current.lock().unwrap() = Some(location);
    }

    pub fn set_page(&self, page: RetrieveResult) {
        *self.page.lock().unwrap() = Some(page);
    }

    pub fn set_latest(&self, anchor: Anchor) {
        *self.latest.lock().unwrap() = Some(anchor);
    }

    pub fn fail_next_start(&self, error: CaptureError) {
        *self.start_error.lock().unwrap() = Some(error);
    }

    /// Emits `location_received` on the engine's own emitter.
    pub fn emit(&self, event: &str) -> usize {
        self.events.emit(event)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.listener_count(event)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CaptureEngine for RecordingEngine {
    async fn get_current(&self) -> Result<CapturedLocation> {
        self.record(Call::GetCurrent);
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or(CaptureError::TemporarilyUnavailable)
    }

    async fn configure(&self, config: CaptureConfiguration) {
        self.record(Call::Configure(config));
    }

    async fn start(&self) -> Result<()> {
        self.record(Call::Start);
        self.start_error.lock().unwrap().take().map_or(Ok(()), Err)
    }

    async fn stop(&self) -> Result<()> {
        self.record(Call::Stop);
        Ok(())
    }

    async fn retrieve(&self, anchor: Option<Anchor>, limit: Option<u32>) -> Result<RetrieveResult> {
        self.record(Call::Retrieve(anchor.clone(), limit));
        Ok(self.page.lock().unwrap().clone().unwrap_or(RetrieveResult {
            locations: Vec::new(),
            next_anchor: anchor.unwrap_or_else(|| Anchor::new("0")),
        }))
    }

    async fn get_latest_anchor(&self) -> Result<Anchor> {
        self.record(Call::GetLatestAnchor);
        Ok(self
            .latest
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Anchor::new("0")))
    }

    fn events(&self) -> Arc<EventEmitter> {
        Arc::clone(&self.events)
    }
}

/// Provider whose fixes are pushed by the test through [`ChannelProvider::push`].
#[derive(Debug, Default)]
pub struct ChannelProvider {
    sink: Mutex<Option<mpsc::Sender<CapturedLocation>>>,
}

impl ChannelProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivers a fix to the running engine. Returns `false` if not started.
    pub async fn push(&self, location: CapturedLocation) -> bool {
        let sink = self.sink.lock().unwrap().clone();
        match sink {
            Some(sink) => sink.send(location).await.is_ok(),
            None => false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }
}

#[async_trait]
impl LocationProvider for ChannelProvider {
    fn is_available(&self) -> bool {
        true
    }

    async fn current_location(&self) -> Result<CapturedLocation> {
        Ok(fix_at(chrono::Utc::now().timestamp(), 48.8566, 2.3522))
    }

    async fn start_updates(&self, sink: mpsc::Sender<CapturedLocation>) -> Result<()> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn stop_updates(&self) -> Result<()> {
        self.sink.lock().unwrap().take();
        Ok(())
    }
}

/// A fix at the given time and position with 10 m accuracy.
pub fn fix_at(timestamp: i64, latitude: f64, longitude: f64) -> CapturedLocation {
    CapturedLocation::new(timestamp, latitude, longitude, 10.0)
}

/// A recent fix with a unique timestamp.
pub fn fresh_fix(latitude: f64) -> CapturedLocation {
    let offset = FIX_COUNTER.fetch_add(1, Ordering::SeqCst);
    let offset = i64::try_from(offset).unwrap_or(0) * 60;
    fix_at(chrono::Utc::now().timestamp() + offset, latitude, 0.0)
}

/// Polls `condition` until it holds or roughly one second elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
