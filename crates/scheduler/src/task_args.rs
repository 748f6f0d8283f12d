//! Typed envelope for the JSON arguments carried by every scan task.

use serde::Serialize;
use serde_json::{Map, Value};

use scanjob_queue::ScanRequestMessage;

use crate::error::TaskArgumentsError;

/// Arguments passed to a scan task and read back when the task fails.
///
/// Serialized as a flat JSON object: `id` (scan run id), `messageId` (source
/// queue message) and the remaining scan request fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskArguments {
    #[serde(rename = "id")]
    pub scan_id: String,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TaskArguments {
    /// The queue message id always wins over any `id`/`messageId` carried in
    /// the request body.
    pub fn from_scan_request(request: ScanRequestMessage, message_id: &str) -> Self {
        let mut fields = request.fields;
        fields.remove("id");
        fields.remove("messageId");
        Self {
            scan_id: request.scan_id,
            message_id: Some(message_id.to_string()),
            fields,
        }
    }

    /// Parse the raw `task_arguments` string of a batch task.
    pub fn parse(raw: &str) -> Result<Self, TaskArgumentsError> {
        let value: Value = serde_json::from_str(raw).map_err(TaskArgumentsError::Malformed)?;
        let Value::Object(mut fields) = value else {
            return Err(TaskArgumentsError::NotAnObject);
        };

        let scan_id = match fields.remove("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            _ => return Err(TaskArgumentsError::MissingScanId),
        };
        let message_id = match fields.remove("messageId") {
            Some(Value::String(id)) => Some(id),
            _ => None,
        };

        Ok(Self {
            scan_id,
            message_id,
            fields,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
