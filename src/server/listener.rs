//! HTTP listener.
//!
//! A fixed pool of worker threads pulls requests off one `tiny_http`
//! server. Workers poll so they notice shutdown without a wake-up.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, error, info, warn};

use super::AuditService;
use crate::config::ServerConfig;
use crate::signal::SignalState;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Listener failures.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Stops a running [`Listener`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    state: Arc<SignalState>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.state.request_shutdown();
    }
}

/// A bound, not yet running, webhook listener.
pub struct Listener {
    server: Arc<Server>,
    workers: usize,
    max_body_bytes: usize,
    state: Arc<SignalState>,
}

impl Listener {
    pub fn bind(config: &ServerConfig, state: Arc<SignalState>) -> Result<Self, ServeError> {
        let server = Server::http(config.bind.as_str()).map_err(|e| ServeError::Bind {
            addr: config.bind.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            server: Arc::new(server),
            workers: config.workers.max(1),
            max_body_bytes: config.max_body_bytes,
            state,
        })
    }

    /// Bound address; useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Serve until shutdown is requested, then join the workers.
    pub fn run(self, service: Arc<AuditService>) -> Result<(), ServeError> {
        info!(addr = ?self.local_addr(), workers = self.workers, "listening");

        let mut handles = Vec::with_capacity(self.workers);
        for i in 0..self.workers {
            let server = Arc::clone(&self.server);
            let service = Arc::clone(&service);
            let state = Arc::clone(&self.state);
            let max_body_bytes = self.max_body_bytes;

            let handle = thread::Builder::new()
                .name(format!("audit-worker-{}", i))
                .spawn(move || worker_loop(&server, &service, &state, max_body_bytes))
                .map_err(ServeError::Spawn)?;
            handles.push(handle);
        }

        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        info!("listener stopped");
        Ok(())
    }
}

fn worker_loop(server: &Server, service: &AuditService, state: &Arc<SignalState>, max_body_bytes: usize) {
    while !state.is_shutdown_requested() {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                let _guard = state.begin_request();
                dispatch(request, service, max_body_bytes);
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "failed to receive request");
                break;
            }
        }
    }
}

fn json_header() -> Option<Header> {
    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).ok()
}

fn respond(request: Request, response: Response<std::io::Cursor<Vec<u8>>>) {
    if let Err(e) = request.respond(response) {
        warn!(error = %e, "failed to write response");
    }
}

fn dispatch(mut request: Request, service: &AuditService, max_body_bytes: usize) {
    debug!(method = %request.method(), url = request.url(), "request");

    if request.url() == "/healthz" {
        if *request.method() == Method::Get {
            respond(request, Response::from_string("ok"));
        } else {
            respond(request, Response::from_string("method not allowed").with_status_code(405u16));
        }
        return;
    }

    if *request.method() != Method::Post {
        respond(request, Response::from_string("method not allowed").with_status_code(405u16));
        return;
    }

    if request.body_length().is_some_and(|len| len > max_body_bytes) {
        respond(request, Response::from_string("payload too large").with_status_code(413u16));
        return;
    }

    let mut body = Vec::new();
    let limit = max_body_bytes as u64 + 1;
    if let Err(e) = request.as_reader().take(limit).read_to_end(&mut body) {
        warn!(error = %e, "failed to read request body");
        respond(request, Response::from_string("bad request").with_status_code(400u16));
        return;
    }
    if body.len() > max_body_bytes {
        respond(request, Response::from_string("payload too large").with_status_code(413u16));
        return;
    }

    let ack = service.handle(&body);
    let json = match serde_json::to_string(&ack) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize acknowledgment");
            respond(request, Response::from_string("internal error").with_status_code(500u16));
            return;
        }
    };

    let mut response = Response::from_string(json).with_status_code(ack.status);
    if let Some(header) = json_header() {
        response = response.with_header(header);
    }
    respond(request, response);
}
