//! Storage-change notification decoding.

use serde_json::Value;
use tracing::debug;

use crate::storage::StorageLocation;

use super::{DecodeError, EventGridEvent};

/// Separates the account host from `<container>/<path>` in public cloud blob URLs.
pub const DEFAULT_DOMAIN_MARKER: &str = ".blob.core.windows.net/";

/// Turns an inbound event into the location of the object that changed.
#[derive(Debug, Clone)]
pub struct NotificationDecoder {
    marker: String,
}

impl Default for NotificationDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN_MARKER)
    }
}

impl NotificationDecoder {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Decode a raw event payload.
    pub fn decode(&self, raw: &[u8]) -> Result<StorageLocation, DecodeError> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        self.decode_value(&value)
    }

    /// Decode an event that was already parsed as JSON.
    pub fn decode_value(&self, value: &Value) -> Result<StorageLocation, DecodeError> {
        let event: EventGridEvent = serde_json::from_value(value.clone())
            .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        self.decode_event(&event)
    }

    pub fn decode_event(&self, event: &EventGridEvent) -> Result<StorageLocation, DecodeError> {
        let url = event.url().ok_or(DecodeError::MissingUrl)?;
        let location = self.parse_url(url)?;
        debug!(
            event_id = %event.id,
            container = %location.container,
            path = %location.path,
            "Decoded event"
        );
        Ok(location)
    }

    /// Split a fully qualified blob URL into container and path.
    ///
    /// The first segment after the marker is the container, the remaining
    /// segments rejoined with `/` are the path. Segments are percent-decoded.
    pub fn parse_url(&self, url: &str) -> Result<StorageLocation, DecodeError> {
        let (_, rest) = url
            .split_once(self.marker.as_str())
            .ok_or_else(|| DecodeError::MarkerNotFound {
                url: url.to_string(),
                marker: self.marker.clone(),
            })?;

        let rest = rest.split(['?', '#']).next().unwrap_or_default();

        let mut segments = rest.split('/').map(|segment| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        });

        let container = segments.next().unwrap_or_default();
        let path = segments.collect::<Vec<_>>().join("/");

        if container.is_empty() || path.is_empty() {
            return Err(DecodeError::IncompleteAddress(url.to_string()));
        }

        Ok(StorageLocation::new(container, path))
    }
}

/// Decode with the default marker.
pub fn decode(raw: &[u8]) -> Result<StorageLocation, DecodeError> {
    NotificationDecoder::default().decode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with_url(url: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt-1",
            "topic": "/subscriptions/s/resourceGroups/rg",
            "subject": "/blobServices/default/containers/jobs/blobs/cfg.json",
            "eventType": "Microsoft.Storage.BlobCreated",
            "data": { "url": url }
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_simple_url() {
        let location = decode(&event_with_url("https://acct.blob.core.windows.net/jobs/cfg.json")).unwrap();
        assert_eq!(location.container, "jobs");
        assert_eq!(location.path, "cfg.json");
    }

    #[test]
    fn test_decode_nested_path() {
        let location =
            decode(&event_with_url("https://acct.blob.core.windows.net/jobs/2024/01/nightly/cfg.json"))
                .unwrap();
        assert_eq!(location.container, "jobs");
        assert_eq!(location.path, "2024/01/nightly/cfg.json");
    }

    #[test]
    fn test_decode_percent_encoded_path() {
        let location =
            decode(&event_with_url("https://acct.blob.core.windows.net/jobs/nightly%20run/cfg.json"))
                .unwrap();
        assert_eq!(location.path, "nightly run/cfg.json");
    }

    #[test]
    fn test_decode_strips_query() {
        let location =
            decode(&event_with_url("https://acct.blob.core.windows.net/jobs/cfg.json?snapshot=1")).unwrap();
        assert_eq!(location.path, "cfg.json");
    }

    #[test]
    fn test_decode_invalid_json() {
        let err = decode(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn test_decode_missing_url() {
        let raw = serde_json::to_vec(&json!({"id": "evt-1", "data": {}})).unwrap();
        assert_eq!(decode(&raw).unwrap_err(), DecodeError::MissingUrl);

        let raw = serde_json::to_vec(&json!({"id": "evt-1"})).unwrap();
        assert_eq!(decode(&raw).unwrap_err(), DecodeError::MissingUrl);
    }

    #[test]
    fn test_decode_marker_absent() {
        let err = decode(&event_with_url("https://example.com/jobs/cfg.json")).unwrap_err();
        assert!(matches!(err, DecodeError::MarkerNotFound { .. }));
    }

    #[test]
    fn test_decode_container_only() {
        let err = decode(&event_with_url("https://acct.blob.core.windows.net/jobs")).unwrap_err();
        assert!(matches!(err, DecodeError::IncompleteAddress(_)));

        let err = decode(&event_with_url("https://acct.blob.core.windows.net/jobs/")).unwrap_err();
        assert!(matches!(err, DecodeError::IncompleteAddress(_)));
    }

    #[test]
    fn test_custom_marker() {
        let decoder = NotificationDecoder::new("127.0.0.1:10000/devstoreaccount1/");
        let location = decoder
            .parse_url("http://127.0.0.1:10000/devstoreaccount1/jobs/cfg.json")
            .unwrap();
        assert_eq!(location, StorageLocation::new("jobs", "cfg.json"));
    }

    #[test]
    fn test_decode_value_non_object() {
        let err = NotificationDecoder::default()
            .decode_value(&json!("just a string"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }
}
