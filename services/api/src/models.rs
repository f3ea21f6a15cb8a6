//! API Models
//!
//! Request and response bodies for the HTTP surface, with `utoipa` schemas for the
//! generated OpenAPI document.

use crate::registry::{SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Serialize, ToSchema, Debug, Default)]
#[serde(default)]
pub struct ConnectPayload {
    /// Caller-side identifier echoed back in the response.
    #[serde(rename = "sessionId")]
    #[schema(example = "practice-42")]
    pub session_id: Option<String>,
    /// Persona instruction for the worker; empty selects the default persona.
    #[serde(rename = "systemPrompt")]
    #[schema(example = "You are my landlord. You are annoyed about late rent.")]
    pub system_prompt: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ConnectResponse {
    #[schema(example = "https://example.daily.co/abc123")]
    pub room_url: String,
    pub token: String,
    pub session_id: Option<String>,
    /// Identifier of the worker process started for this room.
    pub bot_id: SessionId,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct StatusResponse {
    pub session_id: SessionId,
    #[schema(value_type = String, example = "running")]
    pub status: SessionStatus,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_payload_uses_camel_case_keys() {
        let json = r#"{"sessionId": "abc", "systemPrompt": "Be my sister."}"#;
        let payload: ConnectPayload = serde_json::from_str(json).unwrap();

        assert_eq!(payload.session_id.as_deref(), Some("abc"));
        assert_eq!(payload.system_prompt, "Be my sister.");
    }

    #[test]
    fn test_connect_payload_fields_are_optional() {
        let payload: ConnectPayload = serde_json::from_str("{}").unwrap();

        assert_eq!(payload.session_id, None);
        assert_eq!(payload.system_prompt, "");
    }

    #[test]
    fn test_status_response_serialization() {
        let running = StatusResponse {
            session_id: 1234,
            status: SessionStatus::Running,
        };
        let finished = StatusResponse {
            session_id: 1234,
            status: SessionStatus::Finished,
        };

        assert_eq!(
            serde_json::to_string(&running).unwrap(),
            r#"{"session_id":1234,"status":"running"}"#
        );
        assert_eq!(
            serde_json::to_string(&finished).unwrap(),
            r#"{"session_id":1234,"status":"finished"}"#
        );
    }

    #[test]
    fn test_invalid_status_deserialization() {
        let result: Result<SessionStatus, _> = serde_json::from_str(r#""Running""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Bot with process ID: 7 not found".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Bot with process ID: 7 not found"}"#);
    }
}
