//! Capture engine backed by the local `SQLite` store.
//!
//! Fixes arrive from a [`LocationProvider`] (while capturing) or from
//! [`LocalCaptureEngine::record_location`]. Each accepted fix is stored,
//! optionally queued for upload, and announced with `location_received` on
//! the engine's emitter.
//!
//! Uploads run on their own task. Queued rows are deleted only after the
//! server accepted them, so an upload cancelled by [`stop`] or dropped
//! mid-request leaves the queue intact.
//!
//! [`stop`]: crate::CaptureEngine::stop

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::provider::LocationProvider;
use super::uploader::LocationUploader;
use crate::capture::{
    CaptureConfiguration, CaptureEngine, CaptureError, Connectivity, EngineSettings, EventEmitter,
    Result, LOCATION_RECEIVED,
};
use crate::location::{Anchor, CapturedLocation, RetrieveResult};
use crate::store::CaptureStorage;

/// Capacity of the provider-to-engine fix channel.
const FIX_CHANNEL_CAPACITY: usize = 100;

/// Seconds per retention day.
const SECONDS_PER_DAY: i64 = 86_400;

/// State shared between the engine and its capture task.
struct EngineCore {
    storage: CaptureStorage,
    settings: RwLock<EngineSettings>,
    events: Arc<EventEmitter>,
    uploader: LocationUploader,
    connectivity: RwLock<Connectivity>,
    last_accepted: Mutex<Option<CapturedLocation>>,
    last_upload: Mutex<Option<DateTime<Utc>>>,
    /// Serializes uploads so a batch is never sent twice.
    upload_lock: Mutex<()>,
    upload_task: Mutex<Option<JoinHandle<()>>>,
}

/// Local capture engine.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
///
/// use location_capture_core::engine::{LocalCaptureEngine, LocationProvider};
/// use location_capture_core::{CaptureEngine, Result};
///
/// async fn begin(provider: Arc<dyn LocationProvider>) -> Result<LocalCaptureEngine> {
///     let engine = LocalCaptureEngine::new(Path::new("/data/capture.db"), provider)?;
///     engine.start().await?;
///     Ok(engine)
/// }
/// ```
pub struct LocalCaptureEngine {
    core: Arc<EngineCore>,
    provider: Arc<dyn LocationProvider>,
    capture_task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalCaptureEngine {
    /// Creates an engine storing locations in the database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or HTTP client cannot be initialized.
    pub fn new(db_path: &Path, provider: Arc<dyn LocationProvider>) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CaptureError::Storage(format!("Failed to create data directory: {e}"))
            })?;
        }
        Self::with_storage(CaptureStorage::new(db_path)?, provider)
    }

    /// Creates an engine over an existing storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_storage(storage: CaptureStorage, provider: Arc<dyn LocationProvider>) -> Result<Self> {
        let core = EngineCore {
            storage,
            settings: RwLock::new(EngineSettings::default()),
            events: Arc::new(EventEmitter::new()),
            uploader: LocationUploader::new()?,
            connectivity: RwLock::new(Connectivity::default()),
            last_accepted: Mutex::new(None),
            last_upload: Mutex::new(None),
            upload_lock: Mutex::new(()),
            upload_task: Mutex::new(None),
        };

        Ok(Self {
            core: Arc::new(core),
            provider,
            capture_task: Mutex::new(None),
        })
    }

    /// Returns a snapshot of the current settings.
    pub async fn settings(&self) -> EngineSettings {
        self.core.settings.read().await.clone()
    }

    /// Returns whether capture is running.
    pub async fn is_capturing(&self) -> bool {
        self.capture_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Records the host's active network, used to gate uploads.
    pub async fn set_connectivity(&self, connectivity: Connectivity) {
        *self.core.connectivity.write().await = connectivity;
    }

    /// Feeds one fix through the capture pipeline.
    ///
    /// Returns `true` if the fix was stored, `false` if it was invalid or
    /// filtered out by the time/distance filters.
    ///
    /// # Errors
    ///
    /// Returns an error if storing the fix fails.
    pub async fn record_location(&self, location: CapturedLocation) -> Result<bool> {
        self.core.ingest(location).await
    }

    /// Uploads everything in the upload queue.
    ///
    /// Returns the number of locations uploaded. Nothing is uploaded when
    /// uploads are disabled or the current connectivity is not permitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails; the locations stay in the queue.
    pub async fn flush_uploads(&self) -> Result<usize> {
        self.core.flush_uploads().await
    }

    /// Returns the number of locations waiting for upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pending_uploads(&self) -> Result<usize> {
        self.core.storage.upload_queue_len()
    }
}

impl EngineCore {
    async fn ingest(self: &Arc<Self>, mut location: CapturedLocation) -> Result<bool> {
        if !location.is_valid() {
            log::warn!(
                "Discarding fix with invalid coordinates ({}, {})",
                location.latitude,
                location.longitude
            );
            return Ok(false);
        }

        let settings = self.settings.read().await.clone();

        {
            let mut last = self.last_accepted.lock().await;
            if let Some(previous) = last.as_ref() {
                if location.timestamp - previous.timestamp < i64::from(settings.time_filter) {
                    log::debug!("Fix at {} inside time filter", location.timestamp);
                    return Ok(false);
                }
                if location.distance_to(previous) < f64::from(settings.distance_filter) {
                    log::debug!("Fix at {} inside distance filter", location.timestamp);
                    return Ok(false);
                }
            }

            location.id = Some(self.storage.add_location(&location)?);
            *last = Some(location.clone());
        }

        if let Some(days) = settings.keep_locations_for {
            let cutoff = Utc::now().timestamp() - i64::from(days) * SECONDS_PER_DAY;
            let removed = self.storage.delete_locations_before(cutoff)?;
            if removed > 0 {
                log::debug!("Pruned {removed} locations older than {days} days");
            }
        }

        if settings.upload_enabled {
            self.storage.enqueue_upload(&location)?;
        }

        self.events.emit(LOCATION_RECEIVED);

        if settings.upload_enabled
            && self.upload_permitted(&settings).await
            && self.upload_due(&settings).await
        {
            self.schedule_upload().await;
        }

        Ok(true)
    }

    async fn upload_permitted(&self, settings: &EngineSettings) -> bool {
        let connectivity = *self.connectivity.read().await;
        settings.upload_connection_type.permits(connectivity)
    }

    async fn upload_due(&self, settings: &EngineSettings) -> bool {
        let last = *self.last_upload.lock().await;
        last.map_or(true, |at| {
            Utc::now().signed_duration_since(at).num_seconds() >= i64::from(settings.upload_frequency)
        })
    }

    /// Starts a background upload unless one is already running.
    async fn schedule_upload(self: &Arc<Self>) {
        let mut task = self.upload_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let core = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            if let Err(e) = core.flush_uploads().await {
                log::warn!("Upload failed, locations kept in queue: {e}");
            }
        }));
    }

    async fn flush_uploads(&self) -> Result<usize> {
        let settings = self.settings.read().await.clone();
        if !settings.upload_enabled {
            return Ok(0);
        }

        if !self.upload_permitted(&settings).await {
            log::debug!("Deferring upload: current connectivity not permitted");
            return Ok(0);
        }

        let _guard = self.upload_lock.lock().await;

        let queued = self.storage.queued_uploads()?;
        if queued.is_empty() {
            return Ok(0);
        }

        *self.last_upload.lock().await = Some(Utc::now());

        self.uploader.upload(&queued, &settings).await?;

        let ids: Vec<i64> = queued.iter().filter_map(|l| l.id).collect();
        self.storage.remove_uploads(&ids)
    }

    async fn cancel_upload(&self) {
        if let Some(task) = self.upload_task.lock().await.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl CaptureEngine for LocalCaptureEngine {
    async fn get_current(&self) -> Result<CapturedLocation> {
        if !self.provider.is_available() {
            return Err(CaptureError::NoProvider);
        }
        self.provider.current_location().await
    }

    async fn configure(&self, config: CaptureConfiguration) {
        let mut settings = self.core.settings.write().await;
        match settings.merged(&config) {
            Ok(next) => {
                *settings = next;
                log::info!("Capture engine reconfigured ({} options)", config.len());
            }
            Err(e) => log::warn!("Ignoring capture configuration: {e}"),
        }
    }

    async fn start(&self) -> Result<()> {
        let mut task = self.capture_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(CaptureError::AlreadyCapturing);
        }
        if !self.provider.is_available() {
            return Err(CaptureError::NoProvider);
        }

        let (tx, mut rx) = mpsc::channel(FIX_CHANNEL_CAPACITY);
        self.provider.start_updates(tx).await?;

        let core = Arc::clone(&self.core);
        *task = Some(tokio::spawn(async move {
            while let Some(location) = rx.recv().await {
                if let Err(e) = core.ingest(location).await {
                    log::warn!("Failed to record location: {e}");
                }
            }
            log::debug!("Location update stream ended");
        }));

        log::info!("Location capture started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(task) = self.capture_task.lock().await.take() else {
            log::debug!("Stop requested while not capturing");
            return Ok(());
        };

        let result = self.provider.stop_updates().await;
        task.abort();
        self.core.cancel_upload().await;
        log::info!("Location capture stopped");
        result
    }

    async fn retrieve(&self, anchor: Option<Anchor>, limit: Option<u32>) -> Result<RetrieveResult> {
        self.core.storage.retrieve(anchor.as_ref(), limit)
    }

    async fn get_latest_anchor(&self) -> Result<Anchor> {
        self.core.storage.latest_anchor()
    }

    fn events(&self) -> Arc<EventEmitter> {
        Arc::clone(&self.core.events)
    }
}
