//! Hosting-contract gateway.
//!
//! Serves the rewritten route table in front of the wrapped inference
//! server: `GET /ping` plus the two `POST /invocations*` paths, each an
//! opaque passthrough to the server's original OpenAI-style path. Built once
//! at bootstrap from the route table; no per-request routing state.

use super::{RouteMethod, RouteTable};
use crate::config::GatewayConfig;
use crate::error::{Result, SlipwayError};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Shared gateway state: upstream client plus the rewritten route table.
pub struct GatewayState {
    client: reqwest::Client,
    upstream: String,
    table: RouteTable,
}

impl GatewayState {
    /// Create gateway state for an upstream server.
    pub fn new(config: &GatewayConfig, table: RouteTable) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SlipwayError::Internal(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            upstream: config.upstream_addr.trim_end_matches('/').to_string(),
            table,
        })
    }

    /// Forward a request to the upstream path the route table maps to.
    async fn forward(
        &self,
        method: RouteMethod,
        exposed_path: &str,
        content_type: Option<String>,
        body: Option<Bytes>,
    ) -> Response {
        let Some(route) = self.table.find(method, exposed_path) else {
            return StatusCode::NOT_FOUND.into_response();
        };

        let url = format!("{}{}", self.upstream, route.upstream_path);
        debug!(exposed = %exposed_path, upstream = %url, "Forwarding request");

        let mut request = match method {
            RouteMethod::Get => self.client.get(&url),
            RouteMethod::Post => self.client.post(&url),
        };
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        match request.send().await {
            Ok(response) => {
                let status = StatusCode::from_u16(response.status().as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                let upstream_ct = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);

                match response.bytes().await {
                    Ok(bytes) => {
                        let mut out = (status, bytes).into_response();
                        if let Some(ct) = upstream_ct {
                            if let Ok(value) = header::HeaderValue::from_str(&ct) {
                                out.headers_mut().insert(header::CONTENT_TYPE, value);
                            }
                        }
                        out
                    }
                    Err(e) => (
                        StatusCode::BAD_GATEWAY,
                        format!("upstream body error: {}", e),
                    )
                        .into_response(),
                }
            }
            Err(e) => (
                StatusCode::BAD_GATEWAY,
                format!("upstream unreachable: {}", e),
            )
                .into_response(),
        }
    }
}

async fn proxy_get(State(state): State<Arc<GatewayState>>, uri: Uri) -> Response {
    state.forward(RouteMethod::Get, uri.path(), None, None).await
}

async fn proxy_post(
    State(state): State<Arc<GatewayState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    state
        .forward(RouteMethod::Post, uri.path(), content_type, Some(body))
        .await
}

/// Build the gateway router from the rewritten route table.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let mut router: Router<Arc<GatewayState>> = Router::new();

    for route in state.table.routes() {
        router = match route.method {
            RouteMethod::Get => router.route(&route.exposed_path, get(proxy_get)),
            RouteMethod::Post => router.route(&route.exposed_path, post(proxy_post)),
        };
    }

    router.with_state(state)
}

/// Run the gateway until the listener fails or the task is cancelled.
pub async fn run_gateway(config: &GatewayConfig, table: RouteTable) -> Result<()> {
    let state = Arc::new(GatewayState::new(config, table)?);
    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        upstream = %config.upstream_addr,
        "Hosting-contract gateway listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
