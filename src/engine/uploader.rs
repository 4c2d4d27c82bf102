//! Uploading captured locations to a remote server.
//!
//! The request body carries the configured extra parameters plus one
//! parameter (`upload_locations_param`) holding the array of locations. Each
//! location includes only the configured `upload_fields`; timestamps are sent
//! as RFC 3339 strings.
//!
//! | Format | Body |
//! |--------|------|
//! | `JSON` | `{"<extra>": "...", "<locations_param>": [{...}, ...]}` |
//! | `FORM_URL_ENCODED` | `<extra>=...&<locations_param>=<JSON array>` |

use std::time::Duration;

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::capture::{CaptureError, EngineSettings, Result, UploadRequestFormat};
use crate::location::{CapturedLocation, LocationField};

/// Timeout for a single upload request.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP uploader for queued locations.
#[derive(Debug, Clone)]
pub struct LocationUploader {
    client: reqwest::Client,
}

impl LocationUploader {
    /// Creates an uploader with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Uploads `locations` using the upload options in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Upload`] if no upload URL is configured, the
    /// request fails, or the server answers with a non-success status.
    pub async fn upload(
        &self,
        locations: &[CapturedLocation],
        settings: &EngineSettings,
    ) -> Result<()> {
        let url = settings
            .upload_url
            .as_deref()
            .ok_or_else(|| CaptureError::Upload("No upload URL configured".to_string()))?;

        let request = self.client.post(url);
        let request = match settings.upload_request_format {
            UploadRequestFormat::Json => request.json(&json_body(locations, settings)),
            UploadRequestFormat::FormUrlEncoded => request.form(&form_body(locations, settings)?),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Upload(format!(
                "Server rejected {} locations with status {status}",
                locations.len()
            )));
        }

        log::info!("Uploaded {} locations to {url}", locations.len());
        Ok(())
    }
}

/// Builds the JSON request body.
#[must_use]
pub fn json_body(locations: &[CapturedLocation], settings: &EngineSettings) -> Value {
    let mut body: Map<String, Value> = settings
        .upload_extra_params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    body.insert(
        settings.upload_locations_param.clone(),
        locations_array(locations, &settings.upload_fields),
    );

    Value::Object(body)
}

/// Builds the form-urlencoded request body as key/value pairs.
///
/// # Errors
///
/// Returns an error if the locations array cannot be serialized.
pub fn form_body(
    locations: &[CapturedLocation],
    settings: &EngineSettings,
) -> Result<Vec<(String, String)>> {
    let encoded = serde_json::to_string(&locations_array(locations, &settings.upload_fields))
        .map_err(|e| CaptureError::Upload(format!("Failed to encode locations: {e}")))?;

    let mut pairs: Vec<(String, String)> = settings
        .upload_extra_params
        .iter()
        .filter(|(k, _)| **k != settings.upload_locations_param)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    pairs.push((settings.upload_locations_param.clone(), encoded));

    Ok(pairs)
}

fn locations_array(locations: &[CapturedLocation], fields: &[LocationField]) -> Value {
    Value::Array(
        locations
            .iter()
            .map(|location| {
                let entry: Map<String, Value> = fields
                    .iter()
                    .map(|field| (field.as_str().to_string(), field_value(location, *field)))
                    .collect();
                Value::Object(entry)
            })
            .collect(),
    )
}

fn field_value(location: &CapturedLocation, field: LocationField) -> Value {
    match field {
        LocationField::Timestamp => DateTime::from_timestamp(location.timestamp, 0)
            .map_or_else(|| Value::from(location.timestamp), |t| Value::from(t.to_rfc3339())),
        LocationField::Latitude => Value::from(location.latitude),
        LocationField::Longitude => Value::from(location.longitude),
        LocationField::Accuracy => Value::from(location.accuracy),
        LocationField::Heading => Value::from(location.heading),
        LocationField::Speed => Value::from(location.speed),
    }
}
