//! Location Capture Core Library
//!
//! Platform-neutral background location capture. Application code talks to a
//! single [`LocationCapture`] service; the service forwards commands to a
//! platform [`CaptureEngine`] and relays `location_received` notifications
//! to one registered notifier.
//!
//! The [`engine`] module provides [`LocalCaptureEngine`](engine::LocalCaptureEngine),
//! a complete engine with time/distance filtering, an `SQLite` location store,
//! retention pruning and optional HTTP uploads.
//!
//! # Example
//!
//! ```
//! use location_capture_core::CaptureConfiguration;
//!
//! let config = CaptureConfiguration::new()
//!     .with("time_filter", 60)
//!     .with("upload_enabled", false);
//! assert_eq!(config.len(), 2);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

mod api;
pub mod capture;
pub mod engine;
pub mod location;
pub mod store;

pub use api::{LocationCapture, Notifier};
pub use capture::{
    CaptureConfiguration, CaptureEngine, CaptureError, EventEmitter, Platform, Result,
    LOCATION_RECEIVED,
};
pub use location::{Anchor, CapturedLocation, RetrieveResult};
