//! The HTTP host the managed runtime talks to.
//!
//! `POST /invocations` runs the agent, `GET /ping` reports health.

use std::future::pending;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;

use crate::invocation::Invoker;

/// The address the managed runtime expects the agent on.
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// The HTTP host failed.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address we tried.
        addr: SocketAddr,
        /// The underlying error.
        source: io::Error,
    },
    /// The server stopped with an error.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

#[derive(Clone)]
struct AppState {
    invoker: Arc<Invoker>,
    started_at: i64,
}

/// Health report for `GET /ping`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PingResponse {
    /// Always `Healthy`, since invocations never hold the host busy.
    pub status: &'static str,
    /// Unix time of the last status change, in seconds.
    pub time_of_last_update: i64,
}

/// Builds the router serving `invoker`.
pub fn router(invoker: Arc<Invoker>) -> Router {
    let state = AppState {
        invoker,
        started_at: Utc::now().timestamp(),
    };
    Router::new()
        .route("/invocations", post(invocations))
        .route("/ping", get(ping))
        .with_state(state)
}

async fn invocations(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!("rejecting a malformed invocation body: {err}");
                let body = json!({ "error": format!("invalid JSON body: {err}") });
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
        }
    };

    let result = state.invoker.invoke(payload).await;
    Json(result).into_response()
}

async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "Healthy",
        time_of_last_update: state.started_at,
    })
}

/// Serves `invoker` on `addr` until SIGINT or SIGTERM.
pub async fn serve(
    addr: SocketAddr,
    invoker: Arc<Invoker>,
) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!("listening on {addr}");

    axum::serve(listener, router(invoker))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {err}");
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to listen for SIGTERM: {err}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
