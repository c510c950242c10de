//! ==============================================================================
//! server.rs - http surface of the telemetry bridge
//! ==============================================================================
//!
//! routes:
//!     GET     /getTelemetry   current display projection (zeros before first POST)
//!     POST    /getTelemetry   raw device reading -> {"status":"ok"} or 400
//!     OPTIONS /getTelemetry   pre-flight, empty 200
//!     HEAD    /getTelemetry   405 (axum would otherwise answer it from GET)
//!     *       /getTelemetry   405 (axum method router)
//!     GET     /health         bridge counters
//!
//! every response carries permissive cors headers: any origin, the three
//! methods above, and the content-type request header.
//!
//! relationships:
//!     - used by: main.rs (binds the listener, calls serve)
//!     - uses: bridge.rs (the shared snapshot handle, injected as axum state)
//!
//! ==============================================================================

use crate::bridge::{BridgeStats, TelemetryBridge};
use crate::domain::DisplayTelemetry;
use crate::error::BridgeError;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// path kept as-is, the dashboard polls it by name
pub const TELEMETRY_PATH: &str = "/getTelemetry";

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// build the application router around a bridge handle
pub fn router(bridge: TelemetryBridge) -> Router {
    Router::new()
        .route(
            TELEMETRY_PATH,
            get(serve_telemetry)
                .post(ingest_telemetry)
                .options(preflight)
                .head(head_not_allowed),
        )
        .route("/health", get(health))
        .layer(cors_layer())
        // CorsLayer only sets these two on pre-flight responses
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(bridge)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// serve the router on an already-bound listener until the process exits
pub async fn serve(listener: TcpListener, bridge: TelemetryBridge) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("[SERVER] Telemetry live at http://{}{}", addr, TELEMETRY_PATH);
    axum::serve(listener, router(bridge)).await?;
    Ok(())
}

// ==============================================================================
// handlers
// ==============================================================================

async fn serve_telemetry(State(bridge): State<TelemetryBridge>) -> Json<DisplayTelemetry> {
    Json(bridge.serve().await)
}

/// body is read as bytes so that a wrong content-type or a schema mismatch
/// both end up as a plain 400 rather than axum's 415/422
async fn ingest_telemetry(
    State(bridge): State<TelemetryBridge>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, BridgeError> {
    let ack = bridge.ingest_json(&body).await?;
    tracing::debug!("[SERVER] accepted reading #{}", ack.sequence);
    Ok(Json(json!({"status": "ok"})))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn head_not_allowed() -> (StatusCode, [(header::HeaderName, &'static str); 1]) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, ALLOWED_METHODS)],
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    stats: BridgeStats,
}

async fn health(State(bridge): State<TelemetryBridge>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stats: bridge.stats().await,
    })
}
