use serde::Serialize;
use serde_json::Value;
use tungstenite::Utf8Bytes;
use tungstenite::protocol::Message as WsMessage;

use crate::utils::HubError;

/// An event notification ready to be fanned out.
///
/// The payload is serialized once, up front, and shared by every connection
/// it is delivered to: cloning a `Message` or turning it into a WebSocket
/// frame never copies the text. The hub does not interpret the payload; `kind`
/// only mirrors its `type` field for logging.
///
/// # Example
///
/// ```rust
/// use hubsub::hub::Message;
///
/// let msg = Message::raw("task_deleted", r#"{"type":"task_deleted","task_id":"t-1"}"#);
/// assert_eq!(msg.kind(), "task_deleted");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: String,
    payload: Utf8Bytes,
}

impl Message {
    /// Serialize an event whose JSON form is an object carrying a string
    /// `type` discriminator.
    pub fn from_event<E: Serialize + ?Sized>(event: &E) -> Result<Self, HubError> {
        let value = serde_json::to_value(event)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(HubError::MissingEventType)?
            .to_string();
        let text = serde_json::to_string(&value)?;
        Ok(Self {
            kind,
            payload: Utf8Bytes::from(text),
        })
    }

    /// Wrap an already serialized payload as-is.
    pub fn raw(kind: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Utf8Bytes::from(payload.into()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }

    /// A text frame sharing this message's buffer.
    pub fn to_frame(&self) -> WsMessage {
        WsMessage::Text(self.payload.clone())
    }
}
