//! Local capture engine.
//!
//! A [`CaptureEngine`](crate::CaptureEngine) implementation that keeps
//! captured locations in `SQLite` and can upload them to a remote server.
//!
//! # Architecture
//!
//! ```text
//! LocalCaptureEngine
//!     ├── LocationProvider (platform sensor, supplied by the host)
//!     ├── CaptureStorage   (location store + upload queue)
//!     ├── LocationUploader (HTTP)
//!     └── EventEmitter     (location_received)
//! ```
//!
//! # Pipeline
//!
//! Every fix is validated, passed through the time and distance filters,
//! stored, pruned by retention, queued for upload when enabled, and
//! announced on the engine's emitter. Uploads then run in the background.

mod local;
mod provider;
mod uploader;

#[cfg(test)]
mod test_server;

pub use local::LocalCaptureEngine;
pub use provider::LocationProvider;
pub use uploader::{form_body, json_body, LocationUploader};
