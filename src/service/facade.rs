//! Transport-independent service facade.
//!
//! Maps the three calls exposed to clients onto the [`MessageRouter`]. The
//! heartbeat stream is modelled by [`HeartbeatSession`], which remembers the
//! last device seen and issues the disconnect when the stream ends.

use std::sync::Arc;
use tracing::debug;

use super::protocol::{Request, Response};
use crate::constants::acks;
use crate::message::MessageRouter;

#[derive(Clone)]
pub struct IotService {
    router: Arc<MessageRouter>,
}

impl IotService {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Code 0 only when the router acknowledges with "Command accepted"
    pub fn send_command(
        &self,
        device_id: &str,
        command: &str,
        user_id: &str,
        auth_token: &str,
    ) -> Response {
        let result = self
            .router
            .handle_command(device_id, command, user_id, auth_token);

        if result == acks::COMMAND_ACCEPTED {
            Response::ok(result)
        } else {
            Response::failed(result)
        }
    }

    pub fn report_status(
        &self,
        device_id: &str,
        status: &str,
        user_id: &str,
        auth_token: &str,
    ) -> Response {
        self.router
            .handle_status_report(device_id, status, user_id, auth_token);
        Response::ok(acks::STATUS_RECEIVED)
    }

    /// Open a heartbeat stream
    pub fn heartbeat_session(&self) -> HeartbeatSession {
        HeartbeatSession {
            router: Arc::clone(&self.router),
            last_device_id: None,
            heartbeats: 0,
            closed: false,
        }
    }

    /// Dispatch one decoded request; heartbeats are recorded on `session`
    pub fn handle_request(&self, session: &mut HeartbeatSession, request: Request) -> Response {
        match request {
            Request::SendCommand {
                device_id,
                command,
                user_id,
                auth_token,
            } => self.send_command(&device_id, &command, &user_id, &auth_token),
            Request::ReportStatus {
                device_id,
                status,
                user_id,
                auth_token,
            } => self.report_status(&device_id, &status, &user_id, &auth_token),
            Request::Heartbeat {
                device_id,
                user_id,
                auth_token,
            } => session.on_heartbeat(&device_id, &user_id, &auth_token),
        }
    }
}

/// One client's heartbeat stream.
///
/// When the session ends ([`finish`](Self::finish) or drop), a disconnect is
/// routed for the last device that sent a heartbeat on it. A session that saw
/// no heartbeat, such as a connection that only sent commands, routes nothing.
pub struct HeartbeatSession {
    router: Arc<MessageRouter>,
    last_device_id: Option<String>,
    heartbeats: u64,
    closed: bool,
}

impl HeartbeatSession {
    /// Acknowledge one heartbeat. "Alive" reflects only that the heartbeat was
    /// queued; validation happens later on the worker.
    pub fn on_heartbeat(&mut self, device_id: &str, user_id: &str, auth_token: &str) -> Response {
        self.last_device_id = Some(device_id.to_string());
        self.heartbeats += 1;

        if self.router.handle_heartbeat(device_id, user_id, auth_token) {
            Response::ok(acks::ALIVE)
        } else {
            Response::failed(acks::AUTH_FAILED)
        }
    }

    pub fn last_device_id(&self) -> Option<&str> {
        self.last_device_id.as_deref()
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// End the stream
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.last_device_id.take() {
            Some(device_id) => {
                debug!(
                    device_id = %device_id,
                    heartbeats = self.heartbeats,
                    "Heartbeat stream ended; routing disconnect"
                );
                self.router.handle_disconnect(&device_id);
            }
            None => debug!("Session ended without heartbeats; no disconnect routed"),
        }
    }
}

impl Drop for HeartbeatSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::constants::DeviceStatus;
    use crate::device::DefaultDeviceRegistry;
    use crate::user::MockUserValidator;
    use std::time::Duration;

    fn service() -> IotService {
        let router = MessageRouter::new(
            Arc::new(DefaultDeviceRegistry::new()),
            Arc::new(MockUserValidator),
            &WorkerConfig::default(),
        )
        .unwrap();
        IotService::new(Arc::new(router))
    }

    #[test]
    fn test_send_command_and_report_status_acks() {
        let service = service();
        let response = service.send_command("d1", "reboot", "u1", "t1");
        assert_eq!(response, Response::ok("Command accepted"));

        let response = service.report_status("d1", "temp=28C", "u1", "t1");
        assert_eq!(response, Response::ok("Status received"));

        service.router().sync(Duration::from_secs(5)).unwrap();
        let info = service.router().device_registry().get_info("d1").unwrap();
        assert_eq!(info.last_status_report, "temp=28C");
    }

    #[test]
    fn test_session_end_disconnects_last_device() {
        let service = service();
        let devices = service.router().device_registry();
        devices.register("d4");

        let mut session = service.heartbeat_session();
        for _ in 0..3 {
            assert_eq!(session.on_heartbeat("d4", "u1", "t1"), Response::ok("Alive"));
        }
        assert_eq!(session.last_device_id(), Some("d4"));
        session.finish();

        service.router().sync(Duration::from_secs(5)).unwrap();
        assert_eq!(devices.get_info("d4").unwrap().status, DeviceStatus::Offline);
        assert!(!devices.is_online("d4"));
    }

    #[test]
    fn test_command_only_session_routes_no_disconnect() {
        let service = service();
        let mut session = service.heartbeat_session();
        let response = service.handle_request(
            &mut session,
            Request::SendCommand {
                device_id: "d2".to_string(),
                command: "reboot".to_string(),
                user_id: "u1".to_string(),
                auth_token: "t1".to_string(),
            },
        );
        assert_eq!(response, Response::ok("Command accepted"));
        assert_eq!(session.heartbeats(), 0);
        session.finish();

        service.router().sync(Duration::from_secs(5)).unwrap();
        let devices = service.router().device_registry();
        assert_eq!(devices.get_info("d2").unwrap().status, DeviceStatus::Online);
        assert_eq!(service.router().stats().enqueued, 1);
    }

    #[test]
    fn test_empty_session_routes_nothing() {
        let service = service();
        service.heartbeat_session().finish();
        service.router().sync(Duration::from_secs(5)).unwrap();
        assert_eq!(service.router().stats().enqueued, 0);
    }
}
