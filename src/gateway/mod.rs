//! HTTP gateway: public surface, CORS handling, error translation.
//!
//! Routes are thin adapters over [`ChatRouter`]; every failure is mapped to
//! a JSON `{error, details}` body by [`ApiError`](crate::error::ApiError)'s
//! response impl. CORS mirrors the original surface: permissive wildcard by
//! default, an origin allow-list when configured, and a 204 answer to any
//! OPTIONS request.

pub mod api;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::providers::{create_provider, SamplingParams};
use crate::router::ChatRouter;
use crate::sessions::SessionRegistry;
use crate::storage::create_storage;

const MAX_BODY_BYTES: usize = 256 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(150);

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ChatRouter>,
    /// Exact-match origin allow-list; empty means wildcard.
    pub allowed_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let storage = create_storage(&config.storage.backend, &config.data_dir)?;
        let provider = create_provider(
            config.provider_name(),
            config.api_key.as_deref(),
            config.api_url.as_deref(),
            config.model_name(),
        )?;
        let sampling = SamplingParams {
            max_tokens: config.inference.max_tokens,
            temperature: config.inference.temperature,
            top_p: config.inference.top_p,
        };
        let router = Arc::new(ChatRouter::new(
            SessionRegistry::new(storage),
            provider,
            sampling,
        ));
        Ok(Self {
            router,
            allowed_origins: Arc::new(config.gateway.allowed_origins.clone()),
        })
    }
}

// ── CORS ────────────────────────────────────────────────────────

fn allow_origin_value(allowed: &[String], origin: Option<&HeaderValue>) -> Option<HeaderValue> {
    if allowed.is_empty() {
        return Some(HeaderValue::from_static("*"));
    }
    let origin = origin?.to_str().ok()?;
    if allowed.iter().any(|candidate| candidate == origin) {
        HeaderValue::from_str(origin).ok()
    } else {
        None
    }
}

fn apply_cors_headers(headers: &mut HeaderMap, allow_origin: Option<HeaderValue>) {
    if let Some(origin) = allow_origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// Answer OPTIONS preflights with 204 and stamp CORS headers on every
/// other response.
async fn cors_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let allow_origin = allow_origin_value(&state.allowed_origins, origin.as_ref());

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut(), allow_origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut(), allow_origin);
    response
}

// ── Server ──────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(api::handle_chat))
        .route("/api/history", get(api::handle_history))
        .route("/api/clear", post(api::handle_clear))
        .route("/api/health", get(api::handle_health))
        .fallback(api::handle_not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            cors_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

pub async fn run_gateway(host: &str, port: u16, config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind gateway to {host}:{port}"))?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
