//! API request and response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dispatch::{MessagePayload, OutboundRequest};
use crate::error::BridgeError;
use crate::protocol::ContactType;
use crate::Result;

/// Request body for `POST /send-message`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub session_id: String,
    pub contact_type: String,
    pub contact_id: String,
    pub message_type: String,
    /// Text for `static` messages.
    #[serde(default)]
    pub message: Option<String>,
    /// Template for `template` messages.
    #[serde(default)]
    pub message_template: Option<String>,
    /// Key/value map rendered into the template.
    #[serde(default)]
    pub template_data: HashMap<String, String>,
    /// Source URL for `image` messages.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl SendMessageRequest {
    /// Validate the request and build a dispatchable message.
    pub fn into_outbound(self) -> Result<OutboundRequest> {
        let contact_type: ContactType = self.contact_type.parse()?;

        let payload = match self.message_type.as_str() {
            "static" => MessagePayload::Static {
                text: self
                    .message
                    .ok_or_else(|| BridgeError::Validation("missing message".into()))?,
            },
            "template" => MessagePayload::Template {
                template: self.message_template.ok_or_else(|| {
                    BridgeError::Validation("missing message_template".into())
                })?,
                data: self.template_data,
            },
            "image" => MessagePayload::Image {
                url: self
                    .image_url
                    .ok_or_else(|| BridgeError::Validation("missing image_url".into()))?,
                caption: self.caption,
            },
            other => {
                return Err(BridgeError::Validation(format!(
                    "invalid message_type: {other}"
                )))
            }
        };

        Ok(OutboundRequest {
            session_id: self.session_id,
            contact_type,
            contact_id: self.contact_id,
            payload,
        })
    }
}

/// Request body for `POST /delete-session`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteSessionRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Request body for `POST /send-bulk-messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSendRequest {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub session_id: String,
    pub message: String,
}

/// Uniform `{status, message}` response body.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            message: message.into(),
        }
    }
}

/// Commands a realtime subscriber may send over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WsClientMessage {
    StartSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    GetQr {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    CheckStatus {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_request() {
        let json = r#"{
            "session_id": "s1",
            "contact_type": "contact",
            "contact_id": "+1 555",
            "message_type": "static",
            "message": "hello"
        }"#;
        let request: SendMessageRequest = serde_json::from_str(json).unwrap();
        let outbound = request.into_outbound().unwrap();

        assert_eq!(outbound.session_id, "s1");
        assert_eq!(outbound.contact_type, ContactType::Contact);
        assert!(matches!(
            outbound.payload,
            MessagePayload::Static { ref text } if text == "hello"
        ));
    }

    #[test]
    fn test_template_request() {
        let json = r#"{
            "session_id": "s1",
            "contact_type": "group",
            "contact_id": "123",
            "message_type": "template",
            "message_template": "hi {name}",
            "template_data": {"name": "Ana"}
        }"#;
        let request: SendMessageRequest = serde_json::from_str(json).unwrap();
        let outbound = request.into_outbound().unwrap();

        match outbound.payload {
            MessagePayload::Template { template, data } => {
                assert_eq!(template, "hi {name}");
                assert_eq!(data.get("name").unwrap(), "Ana");
            }
            other => panic!("expected template payload, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_message_type() {
        let json = r#"{
            "session_id": "s1",
            "contact_type": "contact",
            "contact_id": "1",
            "message_type": "video"
        }"#;
        let request: SendMessageRequest = serde_json::from_str(json).unwrap();
        assert!(matches!(
            request.into_outbound(),
            Err(BridgeError::Validation(_))
        ));
    }

    #[test]
    fn test_static_requires_message() {
        let json = r#"{
            "session_id": "s1",
            "contact_type": "contact",
            "contact_id": "1",
            "message_type": "static"
        }"#;
        let request: SendMessageRequest = serde_json::from_str(json).unwrap();
        assert!(matches!(
            request.into_outbound(),
            Err(BridgeError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_contact_type() {
        let json = r#"{
            "session_id": "s1",
            "contact_type": "broadcast",
            "contact_id": "1",
            "message_type": "static",
            "message": "hi"
        }"#;
        let request: SendMessageRequest = serde_json::from_str(json).unwrap();
        assert!(matches!(
            request.into_outbound(),
            Err(BridgeError::Validation(_))
        ));
    }

    #[test]
    fn test_ws_client_message_parse() {
        let msg: WsClientMessage =
            serde_json::from_str(r#"{"type": "start-session", "sessionId": "s1"}"#).unwrap();
        assert!(matches!(
            msg,
            WsClientMessage::StartSession { ref session_id } if session_id == "s1"
        ));

        let msg: WsClientMessage =
            serde_json::from_str(r#"{"type": "get-qr", "sessionId": "s1"}"#).unwrap();
        assert!(matches!(msg, WsClientMessage::GetQr { .. }));

        let msg: WsClientMessage =
            serde_json::from_str(r#"{"type": "check-status", "sessionId": "s1"}"#).unwrap();
        assert!(matches!(msg, WsClientMessage::CheckStatus { .. }));
    }

    #[test]
    fn test_status_response_serialization() {
        let json = serde_json::to_value(StatusResponse::success("message sent")).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "message sent");
    }
}
