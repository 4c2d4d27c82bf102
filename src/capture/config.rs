//! Capture configuration.
//!
//! [`CaptureConfiguration`] is the opaque options record application code
//! hands to the facade. The facade passes it through untouched; only an
//! engine interprets it. [`EngineSettings`] is the typed view the local
//! engine keeps, with defaults matching the native capture modules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{CaptureError, Result};
use crate::location::LocationField;

/// Opaque configuration options for a capture engine.
///
/// # Example
///
/// ```
/// use location_capture_core::CaptureConfiguration;
///
/// let config = CaptureConfiguration::new()
///     .with("time_filter", 60)
///     .with("upload_enabled", false);
/// assert_eq!(config.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureConfiguration(Map<String, Value>);

impl CaptureConfiguration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an option.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over all options.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses a configuration from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Converts this configuration to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (extremely rare).
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Map<String, Value>> for CaptureConfiguration {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Networks over which queued locations may be uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UploadConnectionType {
    /// Upload only over Wi-Fi.
    WifiOnly,
    /// Upload over Wi-Fi or cellular data.
    #[default]
    WifiAndCellular,
}

impl UploadConnectionType {
    /// Converts to the configuration value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WifiOnly => "WIFI",
            Self::WifiAndCellular => "WIFI+CELLULAR",
        }
    }

    /// Parses from the configuration value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WIFI" => Some(Self::WifiOnly),
            "WIFI+CELLULAR" => Some(Self::WifiAndCellular),
            _ => None,
        }
    }

    /// Returns whether uploads may use the given connectivity.
    #[must_use]
    pub const fn permits(self, connectivity: Connectivity) -> bool {
        match connectivity {
            Connectivity::Offline => false,
            Connectivity::Wifi => true,
            Connectivity::Cellular => matches!(self, Self::WifiAndCellular),
        }
    }
}

/// The host's active network, as reported to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Connectivity {
    /// No network connection.
    Offline,
    /// Connected over Wi-Fi.
    #[default]
    Wifi,
    /// Connected over cellular data.
    Cellular,
}

/// Request body encoding for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UploadRequestFormat {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    FormUrlEncoded,
}

impl UploadRequestFormat {
    /// Converts to the configuration value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::FormUrlEncoded => "FORM_URL_ENCODED",
        }
    }

    /// Parses from the configuration value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JSON" => Some(Self::Json),
            "FORM_URL_ENCODED" => Some(Self::FormUrlEncoded),
            _ => None,
        }
    }
}

/// Typed settings for the local capture engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Minimum seconds between stored fixes.
    pub time_filter: u32,

    /// Minimum metres between stored fixes.
    pub distance_filter: u32,

    /// Whether captured fixes are queued for upload.
    pub upload_enabled: bool,

    /// Upload endpoint.
    pub upload_url: Option<String>,

    /// Networks allowed for uploads.
    pub upload_connection_type: UploadConnectionType,

    /// Minimum seconds between uploads (0 uploads after every fix).
    pub upload_frequency: u32,

    /// Upload body encoding.
    pub upload_request_format: UploadRequestFormat,

    /// Name of the parameter holding the uploaded locations.
    pub upload_locations_param: String,

    /// Additional parameters sent with every upload.
    pub upload_extra_params: BTreeMap<String, String>,

    /// Per-location fields included in uploads.
    pub upload_fields: Vec<LocationField>,

    /// Retention in days. `None` keeps locations forever.
    pub keep_locations_for: Option<u32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            time_filter: 30,
            distance_filter: 0,
            upload_enabled: false,
            upload_url: None,
            upload_connection_type: UploadConnectionType::default(),
            upload_frequency: 0,
            upload_request_format: UploadRequestFormat::default(),
            upload_locations_param: "locations".to_string(),
            upload_extra_params: BTreeMap::new(),
            upload_fields: vec![
                LocationField::Timestamp,
                LocationField::Latitude,
                LocationField::Longitude,
            ],
            keep_locations_for: Some(30),
        }
    }
}

impl EngineSettings {
    /// Returns a copy of these settings with every recognised key in
    /// `config` applied.
    ///
    /// Keys absent from `config` keep their current value. Unrecognised keys
    /// are ignored. `upload_extra_params` and `upload_fields` replace the
    /// existing collections wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidConfiguration`] if any recognised key has
    /// the wrong type or an unknown enumeration value, or if uploads end up
    /// enabled without an upload URL. `self` is never modified.
    pub fn merged(&self, config: &CaptureConfiguration) -> Result<Self> {
        let mut next = self.clone();

        for (key, value) in config.iter() {
            match key.as_str() {
                "time_filter" => next.time_filter = as_u32(key, value)?,
                "distance_filter" => next.distance_filter = as_u32(key, value)?,
                "upload_enabled" => next.upload_enabled = as_bool(key, value)?,
                "upload_url" => {
                    next.upload_url = match value {
                        Value::Null => None,
                        _ => Some(as_str(key, value)?.to_string()),
                    };
                }
                "upload_connection_type" => {
                    let raw = as_str(key, value)?;
                    next.upload_connection_type = UploadConnectionType::parse(raw)
                        .ok_or_else(|| invalid(key, &format!("unknown connection type {raw}")))?;
                }
                "upload_frequency" => next.upload_frequency = as_u32(key, value)?,
                "upload_request_format" => {
                    let raw = as_str(key, value)?;
                    next.upload_request_format = UploadRequestFormat::parse(raw)
                        .ok_or_else(|| invalid(key, &format!("unknown request format {raw}")))?;
                }
                "upload_locations_param" => {
                    next.upload_locations_param = as_str(key, value)?.to_string();
                }
                "upload_extra_params" => {
                    let map = value
                        .as_object()
                        .ok_or_else(|| invalid(key, "expected an object"))?;
                    next.upload_extra_params = map
                        .iter()
                        .map(|(k, v)| -> Result<(String, String)> {
                            Ok((k.clone(), as_str(key, v)?.to_string()))
                        })
                        .collect::<Result<_>>()?;
                }
                "upload_fields" => {
                    let items = value
                        .as_array()
                        .ok_or_else(|| invalid(key, "expected an array"))?;
                    next.upload_fields = items
                        .iter()
                        .map(|item| -> Result<LocationField> {
                            let raw = as_str(key, item)?;
                            LocationField::parse(raw)
                                .ok_or_else(|| invalid(key, &format!("unknown field {raw}")))
                        })
                        .collect::<Result<_>>()?;
                }
                "keep_locations_for" => {
                    let days = value
                        .as_i64()
                        .ok_or_else(|| invalid(key, "expected an integer"))?;
                    next.keep_locations_for = match days {
                        -1 => None,
                        d => Some(
                            u32::try_from(d)
                                .map_err(|_| invalid(key, "expected -1 or a day count"))?,
                        ),
                    };
                }
                other => log::debug!("Ignoring unrecognised capture option {other}"),
            }
        }

        if next.upload_enabled && next.upload_url.is_none() {
            return Err(CaptureError::InvalidConfiguration(
                "upload_enabled requires upload_url".to_string(),
            ));
        }

        Ok(next)
    }
}

fn invalid(key: &str, reason: &str) -> CaptureError {
    CaptureError::InvalidConfiguration(format!("{key}: {reason}"))
}

fn as_u32(key: &str, value: &Value) -> Result<u32> {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| invalid(key, "expected a non-negative integer"))
}

fn as_bool(key: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| invalid(key, "expected a boolean"))
}

fn as_str<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| invalid(key, "expected a string"))
}
