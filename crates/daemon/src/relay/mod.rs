//! HTTP relay in front of one or more device hubs
//!
//! Every request is forwarded to a hub and the answer is relayed back with
//!  CORS headers added, so browser-side clients can reach hubs that only
//!  listen on loopback.

use axum::extract::State;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;
use url::Url;

mod config;
mod cors;
mod forward;
mod health;

pub use config::Config;
pub use forward::{resolve_upstream, translate_status, ForwardError, HUB_PREFIX};

const STATUS_PREFIX: &str = "/_status";
pub const LOCAL_HTTP_KEY_PATH: &str = "/relayutility/localhttpkey";

#[derive(Debug, Clone)]
pub struct RelayState {
    client: reqwest::Client,
    hub_url: Url,
    http_key: Option<String>,
}

impl RelayState {
    pub fn new(config: &Config) -> Result<Self, RelayError> {
        // Redirects are the client's business, not the relay's
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            hub_url: config.hub_url.clone(),
            http_key: config.http_key.clone(),
        })
    }
}

async fn local_http_key(State(state): State<RelayState>) -> Response {
    Json(serde_json::json!({ "httpkey": state.http_key })).into_response()
}

/// Build the relay's router
pub fn router(config: &Config) -> Result<Router, RelayError> {
    let state = RelayState::new(config)?;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(config.log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    Ok(Router::new()
        .nest(STATUS_PREFIX, health::router())
        .route(LOCAL_HTTP_KEY_PATH, get(local_http_key))
        .fallback(forward::handler)
        .with_state(state)
        .layer(middleware::from_fn(cors::with_cors))
        .layer(trace_layer))
}

/// Serve the relay on an already bound listener until `shutdown_rx` fires
pub async fn serve(
    listener: TcpListener,
    config: Config,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), RelayError> {
    let router = router(&config)?;

    tracing::info!(addr = ?listener.local_addr()?, hub = %config.hub_url, "relay listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

/// Run the relay on `config.listen_addr`
pub async fn run_relay(config: Config, shutdown_rx: watch::Receiver<()>) -> Result<(), RelayError> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    serve(listener, config, shutdown_rx).await
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("an error occurred running the relay: {0}")]
    ServingFailed(#[from] std::io::Error),
    #[error("could not build the hub client: {0}")]
    Client(#[from] reqwest::Error),
}
