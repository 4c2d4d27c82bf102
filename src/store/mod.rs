//! Persistent storage for the local capture engine.
//!
//! ```text
//! CaptureStorage (SQLite)
//!     ├── location_store (retained history, paged by anchor)
//!     └── upload_queue   (pending uploads)
//! ```

mod storage;

pub use storage::CaptureStorage;
