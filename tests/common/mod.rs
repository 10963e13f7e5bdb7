//! Shared utilities for integration tests: an in-process mock balancer.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use balancer_telemetry::TelemetryConfig;

pub const RATE_LIMIT_BODY: &str = r#"{"status":"success","data":{"enabled":true,"type":"token_bucket","global_limit":1000,"per_ip_limit":100,"active_ips":2,"global_tokens":990.0}}"#;
pub const BREAKER_BODY: &str = r#"{"status":"success","data":{"http://localhost:9001":{"state":"CLOSED","failure_count":0,"error_rate":0.0},"http://localhost:9002":{"state":"OPEN","failure_count":7,"error_rate":0.7}}}"#;
pub const LOAD_BALANCER_BODY: &str = r#"{"success":true,"data":{"algorithm":"round_robin","total_requests":120,"active_backends":2}}"#;

/// Canned response for one polled resource.
pub struct Canned {
    pub status: StatusCode,
    pub body: String,
}

impl Canned {
    fn ok(body: &str) -> Mutex<Self> {
        Mutex::new(Self {
            status: StatusCode::OK,
            body: body.to_string(),
        })
    }
}

/// Behaviour of the mock, adjustable while it runs.
pub struct MockState {
    /// Frames sent to every new stream connection.
    pub initial_frames: Mutex<Vec<String>>,
    /// Close the stream right after the initial frames.
    pub close_after_initial: AtomicBool,
    pub connections: AtomicUsize,
    pub live: broadcast::Sender<String>,
    pub rate_limit: Mutex<Canned>,
    pub circuit_breaker: Mutex<Canned>,
    pub load_balancer: Mutex<Canned>,
    /// Delay applied to every resource response.
    pub response_delay_ms: AtomicU64,
}

pub struct MockBalancer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBalancer {
    pub async fn start() -> Self {
        let (live, _) = broadcast::channel(64);
        let state = Arc::new(MockState {
            initial_frames: Mutex::new(Vec::new()),
            close_after_initial: AtomicBool::new(false),
            connections: AtomicUsize::new(0),
            live,
            rate_limit: Canned::ok(RATE_LIMIT_BODY),
            circuit_breaker: Canned::ok(BREAKER_BODY),
            load_balancer: Canned::ok(LOAD_BALANCER_BODY),
            response_delay_ms: AtomicU64::new(0),
        });

        let app = Router::new()
            .route("/metrics/ws", get(stream_handler))
            .route("/api/rate-limit", get(rate_limit_handler))
            .route("/api/circuit-breaker", get(circuit_breaker_handler))
            .route("/api/load-balancer", get(load_balancer_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn set_initial_frames(&self, frames: Vec<String>) {
        *self.state.initial_frames.lock().unwrap() = frames;
    }

    /// Push a frame to every open stream connection.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.state.live.send(frame.into());
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Config pointed at this mock, with fast polling.
    pub fn config(&self) -> TelemetryConfig {
        let mut config = TelemetryConfig::default();
        config.endpoint.base_url = format!("http://{}", self.addr);
        config.polling.interval_ms = 50;
        config.polling.timeout_ms = 1000;
        config.stream.reconnect.base_delay_ms = 20;
        config.stream.reconnect.max_delay_ms = 100;
        config
    }
}

async fn stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<MockState>>) -> Response {
    ws.on_upgrade(move |socket| serve_stream(socket, state))
}

async fn serve_stream(mut socket: WebSocket, state: Arc<MockState>) {
    state.connections.fetch_add(1, Ordering::SeqCst);
    let mut live = state.live.subscribe();

    let frames = state.initial_frames.lock().unwrap().clone();
    for frame in frames {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
    if state.close_after_initial.load(Ordering::SeqCst) {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            frame = live.recv() => match frame {
                Ok(frame) => {
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                Err(_) => return,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn rate_limit_handler(State(state): State<Arc<MockState>>) -> Response {
    respond(&state, &state.rate_limit).await
}

async fn circuit_breaker_handler(State(state): State<Arc<MockState>>) -> Response {
    respond(&state, &state.circuit_breaker).await
}

async fn load_balancer_handler(State(state): State<Arc<MockState>>) -> Response {
    respond(&state, &state.load_balancer).await
}

async fn respond(state: &MockState, canned: &Mutex<Canned>) -> Response {
    let delay = state.response_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let (status, body) = {
        let canned = canned.lock().unwrap();
        (canned.status, canned.body.clone())
    };
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

pub fn set_resource(canned: &Mutex<Canned>, status: StatusCode, body: &str) {
    let mut canned = canned.lock().unwrap();
    canned.status = status;
    canned.body = body.to_string();
}

/// JSON for one replica record.
pub fn record_json(id: u32, ema_ms: f64, error_rate: f64, alive: bool) -> String {
    format!(
        r#"{{"id":{},"url":"http://localhost:{}","ema_ms":{},"error_rate":{},"alive":{},"last_checked":"2024-05-01T12:00:00Z"}}"#,
        id,
        9000 + id,
        ema_ms,
        error_rate,
        alive
    )
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
