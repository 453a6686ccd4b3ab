//! Span and log coverage for the controller and the provider adapter.

mod common;

use std::time::Duration;

use httpmock::prelude::*;
use tempfile::TempDir;
use tracing_test::traced_test;
use url::Url;

use common::{profile_for, Harness};
use session_gate::domain::error::ProviderError;
use session_gate::domain::ports::ProfileStore;
use session_gate::infra::provider::{HostedProvider, ProviderSettings};
use session_gate::model::Page;

#[traced_test]
#[tokio::test]
async fn check_auth_runs_in_controller_span() {
    let h = Harness::new();

    let page = h.gate.controller().check_auth().await;

    assert_eq!(page, Some(Page::Login));
    assert!(logs_contain("session_gate.controller.check_auth"));
}

#[traced_test]
#[tokio::test]
async fn session_lookup_failure_is_logged() {
    let h = Harness::new();
    h.identity
        .fail_current(ProviderError::transport("auth.session", "connection refused"));

    h.gate.controller().check_auth().await;

    assert!(logs_contain("session lookup failed, treating as signed out"));
    assert!(logs_contain("connection refused"));
}

#[traced_test]
#[tokio::test]
async fn missing_and_failed_profiles_are_logged_differently() {
    let h = Harness::new();
    h.signed_in();
    h.gate.controller().check_auth().await;
    assert!(logs_contain("no profile row yet"));

    h.profiles
        .fail_find(ProviderError::http("profiles.find", 500, "boom"));
    h.gate.controller().check_auth().await;
    assert!(logs_contain("profile lookup failed"));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn stale_result_is_logged_when_discarded() {
    let h = Harness::new();
    let s = h.signed_in();
    h.profiles.put(profile_for(&s, Some(1)));
    h.profiles.delay_find(Duration::from_secs(1));

    let controller = h.gate.controller().clone();
    let check = tokio::spawn(async move { controller.check_auth().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.gate.controller().sign_out().await;

    assert_eq!(check.await.unwrap(), None);
    assert!(logs_contain("discarding stale profile result"));
}

#[traced_test]
#[tokio::test]
async fn provider_calls_run_in_outgoing_http_span() {
    let server = MockServer::start();
    let dir = TempDir::new().unwrap();
    let _mock = server.mock(|when, then| {
        when.method(GET).path("/rest/v1/profiles");
        then.status(200).body("[]");
    });
    let provider = HostedProvider::new(ProviderSettings {
        base_url: Url::parse(&server.base_url()).unwrap(),
        anon_key: "anon".into(),
        profiles_table: "profiles".into(),
        request_timeout: Duration::from_secs(5),
        session_file: Some(dir.path().join("session.json")),
    })
    .unwrap();

    let found = provider.find_profile(&common::session()).await.unwrap();

    assert_eq!(found, None);
    assert!(logs_contain("outgoing_http"));
    assert!(logs_contain("session_gate.provider.find_profile"));
    assert!(logs_contain("provider responded"));
}
