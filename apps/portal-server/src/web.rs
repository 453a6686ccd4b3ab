use std::sync::Arc;
use std::time::Duration;

use axum::{response::Json, routing::get, Router};
use runtime::ServerConfig;
use serde_json::{json, Value};
use session_gate::SessionGate;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::request_id::{create_trace_layer, MakeReqId, X_REQUEST_ID};

/// Request bodies above this are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Full application router: health probe, session gate routes and the
/// middleware stack, outermost layer last.
pub fn build_router(gate: &Arc<SessionGate>, server: &ServerConfig) -> Router {
    let mut router = Router::new().route("/health", get(health_check));
    router = gate.register_rest(router);

    // Innermost first: the span sees the id that the outer layers set
    router = router.layer(create_trace_layer());
    router = router.layer(PropagateRequestIdLayer::new(X_REQUEST_ID));
    router = router.layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeReqId));

    // SSE streams outlive the timeout once headers are sent
    if server.timeout_sec > 0 {
        router = router.layer(TimeoutLayer::new(Duration::from_secs(server.timeout_sec)));
    }

    if server.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}
