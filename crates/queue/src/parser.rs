//! Parse scan request message text.

use serde_json::{Map, Value};

use crate::message::QueueMessage;
use crate::error::QueueError;

/// A scan request pulled off the queue.
///
/// Only `id` is interpreted here; every other field is kept so that it can be
/// forwarded to the scan task unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequestMessage {
    /// Scan run id the request belongs to.
    pub scan_id: String,
    /// Remaining request fields (url, priority, ...).
    pub fields: Map<String, Value>,
}

/// Parse a queue message into a [`ScanRequestMessage`].
///
/// Rejects messages that are not a JSON object or carry no non-empty string `id`;
/// such messages cannot be correlated to a scan run.
pub fn parse_scan_request(msg: &QueueMessage) -> Result<ScanRequestMessage, QueueError> {
    let json: Value = serde_json::from_str(&msg.message_text).map_err(|e| {
        QueueError::MalformedRequest(format!("Invalid JSON in message {}: {}", msg.message_id, e))
    })?;

    let Value::Object(mut fields) = json else {
        return Err(QueueError::MalformedRequest(format!(
            "Message {} text is not a JSON object",
            msg.message_id
        )));
    };

    let scan_id = match fields.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        _ => {
            return Err(QueueError::MalformedRequest(format!(
                "Message {} has no scan id",
                msg.message_id
            )))
        }
    };

    Ok(ScanRequestMessage { scan_id, fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_msg(text: &str) -> QueueMessage {
        QueueMessage {
            message_id: "msg-1".to_string(),
            message_text: text.to_string(),
            receipt_handle: "handle-1".to_string(),
            timestamp: Utc::now(),
            dequeue_count: 1,
        }
    }

    #[test]
    fn parses_id_and_keeps_other_fields() {
        let msg = make_msg(r#"{"id":"scan-42","url":"https://example.com","priority":5}"#);
        let req = parse_scan_request(&msg).unwrap();
        assert_eq!(req.scan_id, "scan-42");
        assert_eq!(req.fields["url"], "https://example.com");
        assert_eq!(req.fields["priority"], 5);
        assert!(!req.fields.contains_key("id"));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = parse_scan_request(&make_msg("not json")).unwrap_err();
        assert!(matches!(err, QueueError::MalformedRequest(_)));
    }

    #[test]
    fn rejects_non_object() {
        assert!(parse_scan_request(&make_msg("[1,2,3]")).is_err());
        assert!(parse_scan_request(&make_msg("\"scan-1\"")).is_err());
    }

    #[test]
    fn rejects_missing_or_blank_id() {
        assert!(parse_scan_request(&make_msg(r#"{"url":"https://example.com"}"#)).is_err());
        assert!(parse_scan_request(&make_msg(r#"{"id":"  "}"#)).is_err());
        assert!(parse_scan_request(&make_msg(r#"{"id":17}"#)).is_err());
    }
}
