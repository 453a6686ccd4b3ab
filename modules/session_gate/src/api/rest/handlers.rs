use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json, Redirect,
    },
    Extension,
};
use futures::{stream, Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};

use crate::api::rest::dto::{CallbackQuery, ProfileFormDto, SignInResponse, ViewDto};
use crate::api::rest::error::{map_domain_error, request_id, unknown_provider, ProblemResponse};
use crate::contract::model::OAuthProvider;
use crate::module::SessionGate;

/// SSE event name for view snapshots.
pub const VIEW_EVENT: &str = "view";

fn snapshot(gate: &SessionGate) -> Json<ViewDto> {
    Json(ViewDto::from(&gate.view().snapshot()))
}

/// Current page display
pub async fn get_view(Extension(gate): Extension<Arc<SessionGate>>) -> Json<ViewDto> {
    snapshot(&gate)
}

/// Stream of view snapshots, starting with the current one
pub async fn view_events(
    Extension(gate): Extension<Arc<SessionGate>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the snapshot so no change falls in between.
    let updates = BroadcastStream::new(gate.view().subscribe())
        .filter_map(|res| async move { res.ok() });
    let current = gate.view().snapshot();

    let events = stream::once(async move { current })
        .chain(updates)
        .take_until(gate.shutdown_token().cancelled_owned())
        .map(|snap| {
            let ev = Event::default()
                .event(VIEW_EVENT)
                .json_data(ViewDto::from(&snap))
                .unwrap_or_else(|_| Event::default().event(VIEW_EVENT).data("serialization_error"));
            Ok(ev)
        });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// Re-run the session check
pub async fn check_session(Extension(gate): Extension<Arc<SessionGate>>) -> Json<ViewDto> {
    gate.controller().check_auth().await;
    snapshot(&gate)
}

/// Start an OAuth sign-in
pub async fn sign_in(
    Extension(gate): Extension<Arc<SessionGate>>,
    Path(provider): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<SignInResponse>, ProblemResponse> {
    let provider: OAuthProvider = provider
        .parse()
        .map_err(|e| unknown_provider(&e, uri.path(), request_id(&headers)))?;

    match gate.controller().sign_in(provider).await {
        Ok(url) => Ok(Json(SignInResponse {
            redirect_url: url.to_string(),
        })),
        Err(e) => {
            error!("Failed to start sign in with {}: {}", provider, e);
            Err(map_domain_error(&e, uri.path(), request_id(&headers)))
        }
    }
}

/// OAuth return URL
pub async fn auth_callback(
    Extension(gate): Extension<Arc<SessionGate>>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let controller = gate.controller();
    match (query.code.as_deref(), query.flow.as_deref(), query.error.as_deref()) {
        (_, _, Some(reason)) => {
            let detail = query.error_description.as_deref().unwrap_or(reason);
            controller.reject_callback(detail);
        }
        (Some(code), Some(flow), None) => {
            if let Err(e) = controller.complete_sign_in(code, flow).await {
                error!("Failed to complete sign in: {}", e);
            }
        }
        _ => controller.reject_callback("missing code or flow"),
    }
    Redirect::to(gate.app_url().as_str())
}

/// Create the signed-in user's profile
pub async fn save_profile(
    Extension(gate): Extension<Arc<SessionGate>>,
    uri: Uri,
    headers: HeaderMap,
    Json(form): Json<ProfileFormDto>,
) -> Result<(StatusCode, Json<ViewDto>), ProblemResponse> {
    match gate.controller().save_profile(form.into()).await {
        Ok(()) => {
            info!("Profile saved");
            Ok((StatusCode::CREATED, snapshot(&gate)))
        }
        Err(e) => {
            error!("Failed to save profile: {}", e);
            Err(map_domain_error(&e, uri.path(), request_id(&headers)))
        }
    }
}

/// Sign out and show the login page
pub async fn sign_out(Extension(gate): Extension<Arc<SessionGate>>) -> Json<ViewDto> {
    gate.controller().sign_out().await;
    snapshot(&gate)
}
