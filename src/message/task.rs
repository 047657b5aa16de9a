use serde::{Deserialize, Serialize};
use std::fmt;

use crate::user::UserCredentials;

/// The four kinds of inbound event the router handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Command,
    StatusReport,
    Heartbeat,
    Disconnect,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Command => "command",
            MessageKind::StatusReport => "status_report",
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::Disconnect => "disconnect",
        }
    }

    /// Disconnects come from the transport, not from a user
    pub fn requires_validation(&self) -> bool {
        !matches!(self, MessageKind::Disconnect)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One routed event, consumed exactly once by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTask {
    pub kind: MessageKind,
    pub device_id: String,
    /// Command text or status report; empty for heartbeats and disconnects
    pub payload: String,
    pub credentials: UserCredentials,
}

impl MessageTask {
    pub fn command(device_id: &str, command: &str, credentials: UserCredentials) -> Self {
        Self::new(MessageKind::Command, device_id, command, credentials)
    }

    pub fn status_report(device_id: &str, status: &str, credentials: UserCredentials) -> Self {
        Self::new(MessageKind::StatusReport, device_id, status, credentials)
    }

    pub fn heartbeat(device_id: &str, credentials: UserCredentials) -> Self {
        Self::new(MessageKind::Heartbeat, device_id, "", credentials)
    }

    pub fn disconnect(device_id: &str) -> Self {
        Self::new(MessageKind::Disconnect, device_id, "", UserCredentials::default())
    }

    fn new(kind: MessageKind, device_id: &str, payload: &str, credentials: UserCredentials) -> Self {
        Self {
            kind,
            device_id: device_id.to_string(),
            payload: payload.to_string(),
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_carries_no_credentials() {
        let task = MessageTask::disconnect("d1");
        assert_eq!(task.kind, MessageKind::Disconnect);
        assert!(!task.kind.requires_validation());
        assert_eq!(task.credentials, UserCredentials::default());
        assert!(MessageKind::Heartbeat.requires_validation());
    }
}
