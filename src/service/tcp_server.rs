//! Device Gateway - line-delimited JSON over TCP
//!
//! Each accepted connection is one client session: any number of request
//! lines, each answered with one response line, and the connection as a whole
//! is that client's heartbeat stream. When the connection ends, for whatever
//! reason, the session routes a disconnect for the last device that sent a
//! heartbeat on it.
//!
//! A line that is not valid UTF-8, not valid JSON, or longer than
//! [`MAX_REQUEST_LINE_BYTES`] is answered with "Malformed request" and the
//! connection stays open.
//!
//! Router calls are synchronous. With an unbounded or non-blocking channel
//! policy they return immediately; under `overflow_policy = "block"` with a
//! bounded queue, a full queue stalls the connection task until space frees.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::facade::{HeartbeatSession, IotService};
use super::protocol::{Request, Response};
use crate::config::ServerConfig;
use crate::constants::MAX_REQUEST_LINE_BYTES;

/// TCP front end for [`IotService`]
#[derive(Clone)]
pub struct DeviceGatewayServer {
    config: ServerConfig,
    service: Arc<IotService>,
    /// Open connections by connection id
    connections: Arc<DashMap<Uuid, ConnectionState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Set before the shutdown signal is sent; checked when admitting a connection
    shutting_down: Arc<AtomicBool>,
    server_state: Arc<RwLock<ServerState>>,
    total_connections: Arc<AtomicU64>,
    requests_handled: Arc<AtomicU64>,
}

impl DeviceGatewayServer {
    pub fn new(config: ServerConfig, service: Arc<IotService>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            config,
            service,
            connections: Arc::new(DashMap::new()),
            shutdown_tx,
            shutting_down: Arc::new(AtomicBool::new(false)),
            server_state: Arc::new(RwLock::new(ServerState::default())),
            total_connections: Arc::new(AtomicU64::new(0)),
            requests_handled: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bind and start accepting connections; returns the bound address
    pub async fn start(&self) -> Result<SocketAddr, ServiceError> {
        let mut state = self.server_state.write().await;
        if state.running {
            return Err(ServiceError::ServerAlreadyRunning);
        }

        let listener = TcpListener::bind(&self.config.bind_address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: self.config.bind_address.clone(),
                error: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;

        state.running = true;
        self.shutting_down.store(false, Ordering::SeqCst);
        state.start_time = Some(Utc::now());
        state.local_address = Some(local_addr);
        drop(state);

        info!(address = %local_addr, "Device gateway listening");

        let server = self.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            server.accept_connections(listener, shutdown_rx).await;
        });

        Ok(local_addr)
    }

    /// Signal every connection to close and wait (bounded by
    /// `graceful_shutdown_timeout_ms`) for them to wind down
    pub async fn stop(&self) -> Result<(), ServiceError> {
        let mut state = self.server_state.write().await;
        if !state.running {
            return Ok(());
        }

        info!(
            active_connections = self.connections.len(),
            "Stopping device gateway gracefully"
        );
        self.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let deadline =
            Instant::now() + Duration::from_millis(self.config.graceful_shutdown_timeout_ms);
        while !self.connections.is_empty() && Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }
        if !self.connections.is_empty() {
            warn!(
                remaining = self.connections.len(),
                "Connections still open after graceful shutdown timeout"
            );
        }

        state.running = false;
        state.local_address = None;
        info!("Device gateway stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.server_state.read().await.running
    }

    pub async fn get_stats(&self) -> GatewayStats {
        let state = self.server_state.read().await;
        GatewayStats {
            running: state.running,
            local_address: state.local_address.map(|addr| addr.to_string()),
            uptime_seconds: state
                .start_time
                .map(|start| (Utc::now() - start).num_seconds().max(0) as u64)
                .unwrap_or(0),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.connections.len(),
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
        }
    }

    pub fn service(&self) -> &Arc<IotService> {
        &self.service
    }

    async fn accept_connections(&self, listener: TcpListener, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let Some(connection_shutdown) = self.admit_connection() else {
                                debug!(peer = %addr, "Refusing connection accepted during shutdown");
                                break;
                            };

                            let connection_id = Uuid::new_v4();
                            debug!(connection_id = %connection_id, peer = %addr, "New connection");

                            self.total_connections.fetch_add(1, Ordering::Relaxed);
                            self.connections.insert(connection_id, ConnectionState {
                                peer_address: addr,
                                connected_at: Utc::now(),
                                requests: 0,
                            });

                            let server = self.clone();
                            tokio::spawn(async move {
                                server.handle_connection(connection_id, stream, connection_shutdown).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    debug!("Connection acceptance loop shutting down");
                    break;
                }
            }
        }
    }

    /// Shutdown receiver for a newly accepted connection, or `None` once
    /// `stop` has begun. Subscribing before reading the flag means a
    /// connection admitted here always observes a later shutdown signal.
    fn admit_connection(&self) -> Option<broadcast::Receiver<()>> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        if self.shutting_down.load(Ordering::SeqCst) {
            return None;
        }
        Some(shutdown_rx)
    }

    async fn handle_connection(
        &self,
        connection_id: Uuid,
        stream: TcpStream,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut session = self.service.heartbeat_session();
        let mut line = Vec::new();

        loop {
            line.clear();
            tokio::select! {
                read_result = read_request_line(&mut reader, &mut line) => {
                    let response = match read_result {
                        Ok(RequestLine::Eof) => {
                            debug!(connection_id = %connection_id, "Connection closed by client");
                            break;
                        }
                        Ok(RequestLine::TooLong) => {
                            warn!(
                                connection_id = %connection_id,
                                limit = MAX_REQUEST_LINE_BYTES,
                                "Request line exceeds size limit"
                            );
                            self.requests_handled.fetch_add(1, Ordering::Relaxed);
                            Response::malformed()
                        }
                        Ok(RequestLine::Complete) => match std::str::from_utf8(&line) {
                            Ok(text) if text.trim().is_empty() => continue,
                            Ok(text) => self.handle_line(&mut session, text),
                            Err(e) => {
                                warn!(connection_id = %connection_id, error = %e, "Request line is not valid UTF-8");
                                self.requests_handled.fetch_add(1, Ordering::Relaxed);
                                Response::malformed()
                            }
                        },
                        Err(e) => {
                            warn!(connection_id = %connection_id, error = %e, "Error reading from connection");
                            break;
                        }
                    };

                    if let Some(mut state) = self.connections.get_mut(&connection_id) {
                        state.requests += 1;
                    }

                    if let Err(e) = write_response(&mut writer, &response).await {
                        warn!(connection_id = %connection_id, error = %e, "Failed to send response");
                        break;
                    }
                }

                _ = shutdown_rx.recv() => {
                    debug!(connection_id = %connection_id, "Connection shutting down");
                    break;
                }
            }
        }

        session.finish();

        if let Some((_, state)) = self.connections.remove(&connection_id) {
            info!(
                connection_id = %connection_id,
                peer = %state.peer_address,
                requests = state.requests,
                duration_ms = (Utc::now() - state.connected_at).num_milliseconds(),
                "Connection handler completed"
            );
        }
    }

    fn handle_line(&self, session: &mut HeartbeatSession, line: &str) -> Response {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
        match Request::parse(line) {
            Ok(request) => self.service.handle_request(session, request),
            Err(e) => {
                warn!(error = %e, line = %line.trim(), "Failed to parse request");
                Response::malformed()
            }
        }
    }
}

/// Outcome of reading one request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestLine {
    /// `buf` holds one line, possibly without a trailing newline at end of stream
    Complete,
    /// The line was longer than [`MAX_REQUEST_LINE_BYTES`]; the rest of it
    /// has been discarded
    TooLong,
    Eof,
}

/// Read one newline-terminated line into `buf`, holding at most
/// `MAX_REQUEST_LINE_BYTES + 1` bytes at a time
async fn read_request_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<RequestLine>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_REQUEST_LINE_BYTES as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(RequestLine::Eof);
    }
    if buf.ends_with(b"\n") || buf.len() <= MAX_REQUEST_LINE_BYTES {
        return Ok(RequestLine::Complete);
    }

    // Drain the oversized line in bounded chunks
    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if read == 0 || buf.ends_with(b"\n") {
            buf.clear();
            return Ok(RequestLine::TooLong);
        }
    }
}

async fn write_response(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    response: &Response,
) -> Result<(), ServiceError> {
    let line = response.to_line()?;
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

#[derive(Debug)]
struct ConnectionState {
    peer_address: SocketAddr,
    connected_at: DateTime<Utc>,
    requests: u64,
}

#[derive(Debug, Default)]
struct ServerState {
    running: bool,
    start_time: Option<DateTime<Utc>>,
    local_address: Option<SocketAddr>,
}

/// Gateway statistics
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    pub running: bool,
    pub local_address: Option<String>,
    pub uptime_seconds: u64,
    pub total_connections: u64,
    pub active_connections: usize,
    pub requests_handled: u64,
}

/// Device gateway errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Server is already running")]
    ServerAlreadyRunning,

    #[error("Failed to bind to address {address}: {error}")]
    BindFailed { address: String, error: String },

    #[error("Connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Response serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
