//! Location data types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres, used for great-circle distances.
const EARTH_RADIUS_METRES: f64 = 6_371_008.8;

/// Sentinel used by capture engines when heading or speed cannot be calculated.
pub const UNKNOWN: f64 = -1.0;

/// A location fix produced by a capture engine.
///
/// Timestamps are whole seconds since the Unix epoch, matching what the
/// native location stores persist.
///
/// # Example
///
/// ```
/// use location_capture_core::location::CapturedLocation;
///
/// let fix = CapturedLocation::new(1_700_000_000, 37.7749, -122.4194, 12.0);
/// assert!(fix.is_valid());
/// assert_eq!(fix.heading(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedLocation {
    /// Store record id. `None` for fixes that have not been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// When the fix was received (Unix seconds).
    pub timestamp: i64,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Horizontal accuracy in metres.
    pub accuracy: f64,

    /// Degrees clockwise from due north, or `-1` when unknown.
    #[serde(default = "unknown")]
    pub heading: f64,

    /// Metres per second, or `-1` when unknown.
    #[serde(default = "unknown")]
    pub speed: f64,
}

const fn unknown() -> f64 {
    UNKNOWN
}

impl CapturedLocation {
    /// Creates an unpersisted fix with unknown heading and speed.
    #[must_use]
    pub const fn new(timestamp: i64, latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            id: None,
            timestamp,
            latitude,
            longitude,
            accuracy,
            heading: UNKNOWN,
            speed: UNKNOWN,
        }
    }

    /// Sets heading and speed.
    #[must_use]
    pub const fn with_motion(mut self, heading: f64, speed: f64) -> Self {
        self.heading = heading;
        self.speed = speed;
        self
    }

    /// Returns the heading, or `None` when the engine could not calculate it.
    #[must_use]
    pub fn heading(&self) -> Option<f64> {
        (self.heading >= 0.0).then_some(self.heading)
    }

    /// Returns the speed, or `None` when the engine could not calculate it.
    #[must_use]
    pub fn speed(&self) -> Option<f64> {
        (self.speed >= 0.0).then_some(self.speed)
    }

    /// Returns whether the coordinates are finite and within range.
    ///
    /// Latitude must be -90.0 to 90.0 and longitude -180.0 to 180.0.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in metres (haversine).
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METRES * a.sqrt().min(1.0).asin()
    }
}

/// Opaque cursor into an engine's retained location history.
///
/// Callers must not interpret anchors; they are only ever obtained from
/// [`get_latest_anchor`](crate::LocationCapture::get_latest_anchor) or a
/// previous [`RetrieveResult::next_anchor`] and handed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Anchor(String);

impl Anchor {
    /// Wraps a raw anchor value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw anchor value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Anchor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Anchor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One page of retained locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResult {
    /// Up to `limit` locations received after the requested anchor.
    pub locations: Vec<CapturedLocation>,

    /// Anchor to pass to the next `retrieve` call for the following page.
    pub next_anchor: Anchor,
}

impl RetrieveResult {
    /// Returns true when the page holds no locations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Returns the number of locations in the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }
}

impl IntoIterator for RetrieveResult {
    type Item = CapturedLocation;
    type IntoIter = std::vec::IntoIter<CapturedLocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.locations.into_iter()
    }
}

/// Per-location fields that can be selected for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationField {
    /// Receive time.
    Timestamp,
    /// Latitude in degrees.
    Latitude,
    /// Longitude in degrees.
    Longitude,
    /// Accuracy in metres.
    Accuracy,
    /// Heading in degrees.
    Heading,
    /// Speed in metres per second.
    Speed,
}

impl LocationField {
    /// Converts to the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Accuracy => "accuracy",
            Self::Heading => "heading",
            Self::Speed => "speed",
        }
    }

    /// Parses from the wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timestamp" => Some(Self::Timestamp),
            "latitude" => Some(Self::Latitude),
            "longitude" => Some(Self::Longitude),
            "accuracy" => Some(Self::Accuracy),
            "heading" => Some(Self::Heading),
            "speed" => Some(Self::Speed),
            _ => None,
        }
    }
}
