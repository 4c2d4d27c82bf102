//! The capture engine seam.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::CaptureConfiguration;
use super::error::Result;
use super::events::EventEmitter;
use crate::location::{Anchor, CapturedLocation, RetrieveResult};

/// A platform capture engine.
///
/// Engines own sensor access, storage and retention. The facade forwards to
/// these methods without interpreting arguments or results.
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    /// Requests a single fix, independent of any ongoing capture.
    async fn get_current(&self) -> Result<CapturedLocation>;

    /// Changes engine behaviour for subsequent capture.
    ///
    /// Rejected configurations are the engine's concern; nothing is reported
    /// back to the caller.
    async fn configure(&self, config: CaptureConfiguration);

    /// Begins capturing.
    async fn start(&self) -> Result<()>;

    /// Halts capturing. Does not cancel in-flight requests.
    async fn stop(&self) -> Result<()>;

    /// Returns up to `limit` retained locations after `anchor`.
    ///
    /// `None` for `limit` returns all remaining locations. The meaning of a
    /// `None` anchor is defined by the engine.
    async fn retrieve(&self, anchor: Option<Anchor>, limit: Option<u32>) -> Result<RetrieveResult>;

    /// Returns the anchor for the most recently captured location.
    async fn get_latest_anchor(&self) -> Result<Anchor>;

    /// Returns the emitter owned by this engine module.
    fn events(&self) -> Arc<EventEmitter>;
}
