//! Location records exchanged between capture engines and application code.
//!
//! - [`CapturedLocation`]: a single fix (timestamp, coordinates, accuracy,
//!   heading, speed)
//! - [`Anchor`]: opaque pagination cursor into an engine's history
//! - [`RetrieveResult`]: one page of retained fixes plus the next anchor
//!
//! # Example Usage
//!
//! ```
//! use location_capture_core::location::{Anchor, CapturedLocation, RetrieveResult};
//!
//! let page = RetrieveResult {
//!     locations: vec![CapturedLocation::new(1_700_000_000, 51.5072, -0.1276, 8.0)],
//!     next_anchor: Anchor::new("1"),
//! };
//!
//! for fix in page {
//!     println!("{} {}", fix.latitude, fix.longitude);
//! }
//! ```

pub mod types;

pub use types::{Anchor, CapturedLocation, LocationField, RetrieveResult, UNKNOWN};
