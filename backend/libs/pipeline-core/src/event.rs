//! Trigger event decoding
//!
//! Two shapes are recognised:
//! - direct object notification: `{"Records": [{"s3": {"bucket": {"name"}, "object": {"key"}}}]}`
//! - enveloped notification:     `{"detail": {"bucket": {"name"}, "object": {"key"}}}`
//!
//! Anything else is rejected as a whole; no partial extraction is attempted.

use crate::error::{codes, PipelineError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Maximum length of the event excerpt attached to decode errors
const EVENT_SNIPPET_LIMIT: usize = 500;

/// Source object identified by a trigger event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    /// Bucket / container holding the uploaded object
    pub container: String,
    /// Storage key of the uploaded object
    pub key: String,
}

impl SourceObject {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Last path segment of the key
    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Filename with its final extension removed (`a.tar.gz` -> `a.tar`)
    pub fn stem(&self) -> &str {
        let filename = self.filename();
        Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
    }
}

/// Which of the recognised shapes an event arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    Direct,
    Enveloped,
}

#[derive(Debug, Deserialize)]
struct BucketRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct ObjectNotification {
    bucket: BucketRef,
    object: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    s3: ObjectNotification,
}

#[derive(Debug, Deserialize)]
struct DirectEvent {
    #[serde(rename = "Records")]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct EnvelopedEvent {
    detail: ObjectNotification,
}

/// Decode a trigger event into the object it refers to
pub fn decode_event(event: &Value) -> Result<(SourceObject, EventShape)> {
    let complete = |n: &ObjectNotification| !n.bucket.name.is_empty() && !n.object.key.is_empty();

    let decoded = EnvelopedEvent::deserialize(event)
        .ok()
        .map(|e| (e.detail, EventShape::Enveloped))
        .filter(|(n, _)| complete(n))
        .or_else(|| {
            DirectEvent::deserialize(event)
                .ok()
                .and_then(|e| e.records.into_iter().next())
                .map(|r| (r.s3, EventShape::Direct))
                .filter(|(n, _)| complete(n))
        });

    match decoded {
        Some((n, shape)) => Ok((SourceObject::new(n.bucket.name, n.object.key), shape)),
        None => Err(PipelineError::invalid_input(
            codes::UNKNOWN_EVENT_STRUCTURE,
            format!(
                "Event structure is not recognized as a direct or enveloped object \
                 notification: {}",
                event_snippet(event)
            ),
        )),
    }
}

/// Parse raw bytes as JSON, classifying malformed payloads as invalid input
pub fn parse_event(raw: &[u8]) -> Result<Value> {
    serde_json::from_slice(raw).map_err(|e| {
        PipelineError::invalid_input(
            codes::INVALID_EVENT_JSON,
            format!("Event is not valid JSON: {e}"),
        )
    })
}

/// Describe an event's top-level layout without echoing whole payloads
fn event_snippet(event: &Value) -> String {
    let summary = match event {
        Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            if let Some(Value::Object(detail)) = map.get("detail") {
                keys.push(format!(
                    "detail_keys={:?}",
                    detail.keys().collect::<Vec<_>>()
                ));
            }
            format!("top-level keys {keys:?}")
        }
        other => format!("non-object payload {other}"),
    };
    summary.chars().take(EVENT_SNIPPET_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_decode_direct_event() {
        let event = json!({
            "Records": [{
                "s3": {"bucket": {"name": "uploads-bucket"}, "object": {"key": "uploads/a.jpg"}}
            }]
        });
        let (source, shape) = decode_event(&event).unwrap();
        assert_eq!(source, SourceObject::new("uploads-bucket", "uploads/a.jpg"));
        assert_eq!(shape, EventShape::Direct);
    }

    #[test]
    fn test_decode_enveloped_event() {
        let event = json!({
            "source": "aws.s3",
            "detail": {"bucket": {"name": "b"}, "object": {"key": "k.png", "size": 12}}
        });
        let (source, shape) = decode_event(&event).unwrap();
        assert_eq!(source.key, "k.png");
        assert_eq!(shape, EventShape::Enveloped);
    }

    #[test]
    fn test_uses_first_record_only() {
        let event = json!({
            "Records": [
                {"s3": {"bucket": {"name": "b"}, "object": {"key": "first.jpg"}}},
                {"s3": {"bucket": {"name": "b"}, "object": {"key": "second.jpg"}}}
            ]
        });
        let (source, _) = decode_event(&event).unwrap();
        assert_eq!(source.key, "first.jpg");
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        let cases = vec![
            json!({}),
            json!({"Records": []}),
            json!({"Records": [{"s3": {"bucket": {"name": "b"}}}]}),
            json!({"detail": {"bucket": {"name": "b"}}}),
            json!({"detail": "not-an-object"}),
            json!({"detail": {"bucket": {"name": ""}, "object": {"key": "k"}}}),
            json!({"detail": {"bucket": {"name": "b"}, "object": {"key": 42}}}),
            json!([1, 2, 3]),
        ];

        for event in cases {
            let err = decode_event(&event).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "event: {event}");
            assert_eq!(err.code(), codes::UNKNOWN_EVENT_STRUCTURE);
        }
    }

    #[test]
    fn test_snippet_lists_detail_keys() {
        let event = json!({"detail": {"bucket": {"name": "b"}}});
        let err = decode_event(&event).unwrap_err();
        assert!(err.message().contains("detail_keys"));
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        let err = parse_event(b"{not json").unwrap_err();
        assert_eq!(err.code(), codes::INVALID_EVENT_JSON);
    }

    #[test]
    fn test_filename_and_stem() {
        let source = SourceObject::new("b", "uploads/2024/photo.final.png");
        assert_eq!(source.filename(), "photo.final.png");
        assert_eq!(source.stem(), "photo.final");

        let bare = SourceObject::new("b", "noext");
        assert_eq!(bare.filename(), "noext");
        assert_eq!(bare.stem(), "noext");

        let hidden = SourceObject::new("b", "uploads/.hidden");
        assert_eq!(hidden.stem(), ".hidden");
    }
}
