//! Platform-neutral capture contracts.
//!
//! This module defines what sits between application code and a capture
//! engine: the [`CaptureEngine`] command seam, the event channels that carry
//! `location_received`, the opaque [`CaptureConfiguration`], and the error
//! type every operation returns.
//!
//! # Architecture
//!
//! ```text
//! LocationCapture (facade, owns the notifier slot)
//!     ├── CaptureEngine (commands)
//!     └── EventChannel (location_received)
//!             ├── ModuleEventChannel  (iOS)
//!             └── DeviceEventChannel  (Android)
//! ```

mod config;
mod engine;
mod error;
pub mod events;
mod platform;

pub use config::{
    CaptureConfiguration, Connectivity, EngineSettings, UploadConnectionType, UploadRequestFormat,
};
pub use engine::CaptureEngine;
pub use error::{CaptureError, Result};
pub use events::{
    select_event_channel, DeviceEventChannel, EventChannel, EventEmitter, Listener,
    ModuleEventChannel, Subscription, LOCATION_RECEIVED,
};
pub use platform::Platform;
