use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

use crate::api::rest::handlers;
use crate::module::SessionGate;

pub fn register_routes(router: Router, gate: Arc<SessionGate>) -> Router {
    let routes = Router::new()
        // Page display
        .route("/session/view", get(handlers::get_view))
        .route("/session/events", get(handlers::view_events))
        // Session lifecycle
        .route("/session/check", post(handlers::check_session))
        .route("/session/sign-in/{provider}", post(handlers::sign_in))
        .route("/auth/callback", get(handlers::auth_callback))
        .route("/session/sign-out", post(handlers::sign_out))
        // Profile creation
        .route("/session/profile", post(handlers::save_profile))
        .layer(Extension(gate));

    router.merge(routes)
}
