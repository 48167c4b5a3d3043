use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dashmap::DashMap;
use relay_core::{ConnectionId, SessionId};
use relay_rules::RuleEngine;
use relay_settings::ServerSettings;
use relay_trace::SessionRecorder;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session;

/// Largest text frame accepted from an avatar client. Bigger messages close
/// the session.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_secs.max(1)),
        }
    }
}

/// Shared application state passed to Axum handlers. Everything here is
/// read-only except the live-session map.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RuleEngine>,
    pub recorder: Arc<SessionRecorder>,
    pub sessions: Arc<DashMap<ConnectionId, SessionId>>,
    pub start_time: Instant,
    pub heartbeat_interval: Duration,
}

impl AppState {
    pub fn new(
        engine: Arc<RuleEngine>,
        recorder: Arc<SessionRecorder>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            engine,
            recorder,
            sessions: Arc::new(DashMap::new()),
            start_time: Instant::now(),
            heartbeat_interval,
        }
    }
}

/// Build the Axum router. Avatar clients connect on `/`; `/ws` is an alias.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and start serving. Port `0` picks a free port; the chosen one is in
/// the returned handle.
pub async fn start(
    config: ServerConfig,
    engine: Arc<RuleEngine>,
    recorder: Arc<SessionRecorder>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(engine, recorder, config.heartbeat_interval);
    let router = build_router(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "relay server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server exited with error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        port: local_addr.port(),
        state,
        shutdown_tx: Some(shutdown_tx),
        server,
    })
}

/// Handle returned by `start()`: keeps the accept loop alive until
/// [`ServerHandle::shutdown`] or drop.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn active_sessions(&self) -> usize {
        self.state.sessions.len()
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.server).await {
            tracing::warn!(error = %e, "server task did not exit cleanly");
        }
        tracing::info!("relay server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket: WebSocket| session::run_session(socket, state))
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "active_sessions": state.sessions.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_rules::{ReferenceCatalog, RuleConfig};

    fn state() -> AppState {
        let engine = RuleEngine::new(Arc::new(ReferenceCatalog::builtin()), RuleConfig::default());
        AppState::new(
            Arc::new(engine),
            Arc::new(SessionRecorder::disabled()),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn config_from_settings() {
        let settings = ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_secs: 5,
        };
        let config = ServerConfig::from(&settings);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
    }

    #[test]
    fn zero_heartbeat_is_clamped() {
        let settings = ServerSettings {
            heartbeat_interval_secs: 0,
            ..ServerSettings::default()
        };
        assert_eq!(ServerConfig::from(&settings).heartbeat_interval, Duration::from_secs(1));
    }

    #[test]
    fn default_config_listens_on_5001() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5001);
    }

    #[tokio::test]
    async fn health_reports_live_sessions() {
        let state = state();
        let Json(body) = health_handler(State(state.clone())).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_sessions"], 0);

        state.sessions.insert(ConnectionId::new(), SessionId::from_raw("session_x"));
        let Json(body) = health_handler(State(state)).await;
        assert_eq!(body["active_sessions"], 1);
        assert!(body["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port() {
        let state = state();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval: Duration::from_secs(30),
        };
        let handle = start(config, state.engine, state.recorder).await.unwrap();
        assert_ne!(handle.port, 0);
        assert_eq!(handle.active_sessions(), 0);
        handle.shutdown().await;
    }
}
