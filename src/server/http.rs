//! HTTP front end: control page, health probe and the `/ws` upgrade.
//!
//! The upgrade is refused with `403` unless the request's `Origin` header is
//! exactly `http://<Host>`, so a page served from another site cannot drive
//! the bridged process through the visitor's browser.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{HOST, ORIGIN};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::connection::{Connection, ConnectionSettings};
use super::page::CONTROL_PAGE;
use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// State shared by all request handlers.
#[derive(Debug)]
pub struct AppState {
    /// Resolved configuration.
    pub config: Arc<GlobalConfig>,
    /// Settings handed to every connection.
    pub settings: Arc<ConnectionSettings>,
    /// Fired on server shutdown; each connection gets a child token.
    pub shutdown: CancellationToken,
    next_id: AtomicU64,
}

impl AppState {
    /// Build handler state from the configuration.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, shutdown: CancellationToken) -> Self {
        let settings = Arc::new(ConnectionSettings::from_config(&config));
        Self {
            config,
            settings,
            shutdown,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_connection_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Whether the request's `Origin` is exactly `http://<Host>`.
///
/// A missing or non-ASCII `Origin` or `Host` never matches.
#[must_use]
pub fn origin_matches_host(headers: &HeaderMap) -> bool {
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    match (host, origin) {
        (Some(host), Some(origin)) => origin
            .strip_prefix("http://")
            .is_some_and(|rest| rest == host),
        _ => false,
    }
}

/// Router with `/`, `/ws` and `/health`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(upgrade))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `config.address:config.port` and serve until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the address cannot be bound, or
/// `AppError::Io` if the server fails.
pub async fn serve(config: Arc<GlobalConfig>, ct: CancellationToken) -> Result<()> {
    let bind = config.bind_addr();
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {bind}: {err}")))?;
    serve_listener(listener, config, ct).await
}

/// Serve on an already bound listener until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve_listener(
    listener: TcpListener,
    config: Arc<GlobalConfig>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(
        %local,
        command = config.command,
        args = ?config.args,
        "starting server"
    );

    let state = Arc::new(AppState::new(config, ct.clone()));
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("server error: {err}")))?;

    info!("server shut down");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(CONTROL_PAGE)
}

async fn health() -> &'static str {
    "ok"
}

async fn upgrade(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !origin_matches_host(&headers) {
        warn!(
            %peer,
            origin = ?headers.get(ORIGIN),
            host = ?headers.get(HOST),
            "rejecting upgrade: origin does not match host"
        );
        return (StatusCode::FORBIDDEN, "Incorrect host origin").into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(%peer, %rejection, "rejecting upgrade: bad handshake");
            return (StatusCode::BAD_REQUEST, "Failed to open websocket connection").into_response();
        }
    };

    let id = state.next_connection_id();
    let connection = Connection::new(id, Arc::clone(&state.settings), state.shutdown.child_token());
    let span = info_span!("connection", id, %peer);

    ws.on_failed_upgrade(move |err| {
        let err = AppError::Socket(format!("upgrade failed: {err}"));
        warn!(id, %err, "websocket upgrade failed");
    })
        .on_upgrade(move |socket| {
            async move {
                info!("connection upgraded");
                let (sink, frames) = socket.split();
                match connection.run(sink, frames).await {
                    Ok(report) => info!(
                        reason = ?report.reason,
                        exit_status = ?report.exit_status,
                        "connection closed"
                    ),
                    Err(err) => error!(%err, "connection failed"),
                }
            }
            .instrument(span)
        })
}
