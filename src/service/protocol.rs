//! Wire format of the device service.
//!
//! One JSON object per line in each direction. Every request names its call in
//! a `"method"` field and is answered by exactly one [`Response`] line:
//!
//! ```text
//! → {"method":"heartbeat","device_id":"d4","user_id":"u1","auth_token":"t"}
//! ← {"code":0,"message":"Alive"}
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::acks;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    SendCommand {
        device_id: String,
        #[serde(default)]
        command: String,
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        auth_token: String,
    },
    ReportStatus {
        device_id: String,
        #[serde(default)]
        status: String,
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        auth_token: String,
    },
    Heartbeat {
        device_id: String,
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        auth_token: String,
    },
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::SendCommand { .. } => "send_command",
            Request::ReportStatus { .. } => "report_status",
            Request::Heartbeat { .. } => "heartbeat",
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Request::SendCommand { device_id, .. }
            | Request::ReportStatus { device_id, .. }
            | Request::Heartbeat { device_id, .. } => device_id,
        }
    }

    /// Parse one request line (surrounding whitespace is ignored)
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// `code` is 0 on success and 1 on failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub code: u32,
    pub message: String,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: acks::CODE_OK,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: acks::CODE_FAILED,
            message: message.into(),
        }
    }

    pub fn malformed() -> Self {
        Self::failed(acks::MALFORMED_REQUEST)
    }

    pub fn is_ok(&self) -> bool {
        self.code == acks::CODE_OK
    }

    /// Serialize as a newline-terminated line
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_heartbeat() {
        let request = Request::parse(
            r#" {"method":"heartbeat","device_id":"d4","user_id":"u1","auth_token":"t"} "#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::Heartbeat {
                device_id: "d4".to_string(),
                user_id: "u1".to_string(),
                auth_token: "t".to_string(),
            }
        );
        assert_eq!(request.method(), "heartbeat");
        assert_eq!(request.device_id(), "d4");
    }

    #[test]
    fn test_missing_credentials_default_to_empty() {
        let request = Request::parse(r#"{"method":"report_status","device_id":"d3"}"#).unwrap();
        match request {
            Request::ReportStatus { status, user_id, auth_token, .. } => {
                assert!(status.is_empty());
                assert!(user_id.is_empty());
                assert!(auth_token.is_empty());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_method_and_garbage() {
        assert!(Request::parse(r#"{"method":"reboot","device_id":"d1"}"#).is_err());
        assert!(Request::parse(r#"{"method":"heartbeat"}"#).is_err());
        assert!(Request::parse("not json").is_err());
    }

    #[test]
    fn test_response_line() {
        let line = Response::ok("Alive").to_line().unwrap();
        assert_eq!(line, "{\"code\":0,\"message\":\"Alive\"}\n");
        assert_eq!(Response::malformed().code, 1);
        assert_eq!(Response::malformed().message, "Malformed request");
    }
}
