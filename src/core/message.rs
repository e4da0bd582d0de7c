//! Bayeux frames exchanged with the live service and the envelope they travel in

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::DeviceProfile;
use crate::constants::{
    CONNECT_CHANNEL, CONTROLLER_CHANNEL, DISCONNECT_CHANNEL, HANDSHAKE_CHANNEL, SERVICE_HOST,
    SUBSCRIBE_CHANNEL,
};
use crate::error::{KahootError, Result};

/// A single Bayeux message. Every field besides `channel` is optional on the
/// wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CometdMessage {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl CometdMessage {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            ..Self::default()
        }
    }

    /// Initial negotiation, always tagged with id `0`
    pub fn handshake() -> Self {
        Self {
            id: Some("0".to_string()),
            version: Some("1.0".to_string()),
            minimum_version: Some("1.0".to_string()),
            supported_connection_types: Some(vec![
                "websocket".to_string(),
                "long-polling".to_string(),
                "callback-polling".to_string(),
            ]),
            advice: Some(json!({"timeout": 60000, "interval": 0})),
            ext: Some(json!({"ack": true, "timesync": {"tc": chrono::Utc::now().timestamp_millis(), "l": 0, "o": 0}})),
            ..Self::new(HANDSHAKE_CHANNEL)
        }
    }

    pub fn subscribe(client_id: &str, subscription: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            subscription: Some(subscription.to_string()),
            ..Self::new(SUBSCRIBE_CHANNEL)
        }
    }

    pub fn connect(client_id: &str, ack: u64) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            connection_type: Some("websocket".to_string()),
            ext: Some(json!({"ack": ack, "timesync": {"tc": chrono::Utc::now().timestamp_millis(), "l": 0, "o": 0}})),
            ..Self::new(CONNECT_CHANNEL)
        }
    }

    pub fn disconnect(client_id: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            ..Self::new(DISCONNECT_CHANNEL)
        }
    }

    /// Room join request carrying the player name and device metadata
    pub fn login(client_id: &str, pin: &str, name: &str, device: &DeviceProfile) -> Self {
        let content = json!({
            "device": {
                "userAgent": device.user_agent,
                "screen": {"width": device.screen_width, "height": device.screen_height},
            }
        });
        Self {
            client_id: Some(client_id.to_string()),
            data: Some(json!({
                "type": "login",
                "gameid": pin,
                "host": SERVICE_HOST,
                "name": name,
                "content": content.to_string(),
            })),
            ..Self::new(CONTROLLER_CHANNEL)
        }
    }

    /// Controller message with a numeric event id and JSON-encoded content
    pub fn controller(client_id: &str, pin: &str, event_id: u16, content: &Value) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            data: Some(json!({
                "type": "message",
                "gameid": pin,
                "host": SERVICE_HOST,
                "id": event_id,
                "content": content.to_string(),
            })),
            ..Self::new(CONTROLLER_CHANNEL)
        }
    }

    /// Response frame acknowledging a request id
    pub fn ack(channel: &str, id: Option<String>, successful: bool) -> Self {
        Self {
            id,
            successful: Some(successful),
            ..Self::new(channel)
        }
    }

    /// Numeric form of the frame id, when it carries one
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_deref().and_then(|id| id.parse().ok())
    }

    /// `data.type` of service frames
    pub fn data_type(&self) -> Option<&str> {
        self.data.as_ref()?.get("type")?.as_str()
    }

    /// `data.id` of player/controller frames
    pub fn data_event_id(&self) -> Option<u16> {
        let id = self.data.as_ref()?.get("id")?.as_u64()?;
        u16::try_from(id).ok()
    }

    /// `data.content` decoded from its JSON string form; plain objects are
    /// passed through
    pub fn data_content(&self) -> Option<Value> {
        match self.data.as_ref()?.get("content")? {
            Value::String(raw) => serde_json::from_str(raw).ok(),
            other => Some(other.clone()),
        }
    }
}

/// Wrap a message into the one-element array the service expects
pub fn encode_envelope(message: &CometdMessage) -> Result<String> {
    Ok(serde_json::to_string(&[message])?)
}

/// Decode a received text frame. The service sends arrays; a bare object is
/// accepted too.
pub fn decode_frames(text: &str) -> Result<Vec<CometdMessage>> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(KahootError::from))
            .collect(),
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        other => Err(KahootError::MessageParseError(format!(
            "Unexpected frame shape: {}",
            other
        ))),
    }
}
