use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::contract::model::UnknownProvider;
use crate::domain::error::DomainError;

/// Media type of every error body this module returns.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Error body in RFC 9457 shape, plus a stable `code` and the request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// Request path of this occurrence.
    pub instance: String,
    /// Stable machine-readable code, `session_gate.*`.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub detail: String,
    /// JSON Pointer to the invalid field (e.g. "/city").
    pub pointer: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_string(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
            request_id: None,
            errors: None,
        }
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_request_id(mut self, id: Option<String>) -> Self {
        self.request_id = id;
        self
    }

    pub fn with_errors(mut self, errors: Vec<ValidationError>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// `Problem` as an axum response carrying its own status.
#[derive(Debug, Clone)]
pub struct ProblemResponse(pub Problem);

impl From<Problem> for ProblemResponse {
    fn from(p: Problem) -> Self {
        Self(p)
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = axum::Json(self.0).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}

/// Request id propagated by the server's request-id layer, if any.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Map a controller error to a Problem. Upstream failures get a fixed detail;
/// the provider's own response stays in the log.
pub fn map_domain_error(e: &DomainError, instance: &str, request_id: Option<String>) -> ProblemResponse {
    let problem = match e {
        DomainError::MissingRequiredFields { fields } => Problem::new(
            StatusCode::BAD_REQUEST,
            "Validation Failed",
            e.to_string(),
        )
        .with_code("session_gate.validation")
        .with_errors(
            fields
                .iter()
                .map(|f| ValidationError {
                    detail: format!("{f} is required"),
                    pointer: format!("/{f}"),
                })
                .collect(),
        ),
        DomainError::NotSignedIn => {
            Problem::new(StatusCode::UNAUTHORIZED, "Unauthorized", e.to_string())
                .with_code("session_gate.not_signed_in")
        }
        DomainError::SignIn { provider, .. } => upstream(
            e,
            "session_gate.sign_in_failed",
            format!("Sign-in with {provider} could not be started"),
        ),
        DomainError::ProfileSave(_) => upstream(
            e,
            "session_gate.profile_save_failed",
            "The profile could not be saved".to_string(),
        ),
        DomainError::Callback(_) => upstream(
            e,
            "session_gate.callback_failed",
            "The sign-in callback could not be completed".to_string(),
        ),
    };
    problem
        .with_instance(instance)
        .with_request_id(request_id)
        .into()
}

fn upstream(e: &DomainError, code: &'static str, detail: String) -> Problem {
    warn!(code, error = %e, "provider failure");
    Problem::new(StatusCode::BAD_GATEWAY, "Bad Gateway", detail).with_code(code)
}

pub fn unknown_provider(e: &UnknownProvider, instance: &str, request_id: Option<String>) -> ProblemResponse {
    Problem::new(StatusCode::BAD_REQUEST, "Bad Request", e.to_string())
        .with_code("session_gate.unknown_provider")
        .with_instance(instance)
        .with_request_id(request_id)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ProviderError;

    #[test]
    fn problem_into_response_sets_status_and_content_type() {
        let p = Problem::new(StatusCode::BAD_REQUEST, "Bad Request", "invalid payload");
        let resp = ProblemResponse(p).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let ct = resp
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert_eq!(ct, APPLICATION_PROBLEM_JSON);
    }

    #[test]
    fn validation_errors_point_at_fields() {
        let err = DomainError::missing_required_fields(vec!["display_name", "city"]);
        let ProblemResponse(p) = map_domain_error(&err, "/session/profile", Some("rid".into()));
        assert_eq!(p.status, 400);
        assert_eq!(p.code, "session_gate.validation");
        assert_eq!(p.instance, "/session/profile");
        assert_eq!(p.request_id.as_deref(), Some("rid"));
        let pointers: Vec<_> = p.errors.unwrap().into_iter().map(|e| e.pointer).collect();
        assert_eq!(pointers, vec!["/display_name", "/city"]);
    }

    #[test]
    fn provider_failures_are_bad_gateway() {
        let err = DomainError::ProfileSave(ProviderError::http("profiles.insert", 409, "dup"));
        let ProblemResponse(p) = map_domain_error(&err, "/session/profile", None);
        assert_eq!(p.status, 502);
        assert_eq!(p.code, "session_gate.profile_save_failed");
        assert_eq!(p.detail, "The profile could not be saved");

        let ProblemResponse(p) = map_domain_error(&DomainError::NotSignedIn, "/x", None);
        assert_eq!(p.status, 401);
    }

    #[test]
    fn upstream_problem_does_not_echo_provider_body() {
        let err = DomainError::Callback(ProviderError::http(
            "auth.token",
            400,
            r#"{"error":"invalid_grant","secret":"pkce-verifier-xyz"}"#,
        ));
        let ProblemResponse(p) = map_domain_error(&err, "/auth/callback", None);
        assert_eq!(p.code, "session_gate.callback_failed");
        assert!(!p.detail.contains("invalid_grant"));
        assert!(!p.detail.contains("pkce-verifier-xyz"));

        let err = DomainError::sign_in(
            "google",
            ProviderError::http("auth.authorize", 500, "stack trace here"),
        );
        let ProblemResponse(p) = map_domain_error(&err, "/session/sign-in/google", None);
        assert_eq!(p.detail, "Sign-in with google could not be started");
    }
}
