//! The sensor seam for the local engine.
//!
//! Positioning hardware, platform permissions and OS location services are
//! out of scope for this crate. Hosts implement [`LocationProvider`] over
//! whatever the platform offers and hand it to
//! [`LocalCaptureEngine`](super::LocalCaptureEngine).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::capture::Result;
use crate::location::CapturedLocation;

/// A source of location fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Returns whether a positioning provider is enabled on this device.
    fn is_available(&self) -> bool;

    /// Produces a single fix.
    ///
    /// # Errors
    ///
    /// Providers report [`CaptureError::OutOfService`],
    /// [`CaptureError::TemporarilyUnavailable`] or
    /// [`CaptureError::PermissionDenied`] when no fix can be delivered.
    ///
    /// [`CaptureError::OutOfService`]: crate::CaptureError::OutOfService
    /// [`CaptureError::TemporarilyUnavailable`]: crate::CaptureError::TemporarilyUnavailable
    /// [`CaptureError::PermissionDenied`]: crate::CaptureError::PermissionDenied
    async fn current_location(&self) -> Result<CapturedLocation>;

    /// Starts delivering fixes into `sink` until [`stop_updates`](Self::stop_updates).
    async fn start_updates(&self, sink: mpsc::Sender<CapturedLocation>) -> Result<()>;

    /// Stops delivering fixes. Dropping the sink also ends delivery.
    async fn stop_updates(&self) -> Result<()>;
}
