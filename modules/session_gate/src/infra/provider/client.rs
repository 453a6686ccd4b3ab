//! HTTP plumbing shared by the auth and profile adapters: endpoint building,
//! the `apikey` header, an `outgoing_http` span per request, and status checks.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{Instrument, Level};
use url::Url;

use crate::domain::error::ProviderError;

#[derive(Clone)]
pub struct ProviderHttp {
    inner: reqwest::Client,
    base: Url,
    anon_key: String,
}

impl ProviderHttp {
    pub fn new(inner: reqwest::Client, base: Url, anon_key: impl Into<String>) -> Self {
        Self {
            inner,
            base,
            anon_key: anon_key.into(),
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/{segments...}`, keeping any path prefix of the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Endpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Request with the project key attached; `bearer` defaults to the key itself.
    pub fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        self.inner
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    /// Send the request inside an `outgoing_http` span and reject non-2xx.
    pub async fn send(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<Response, ProviderError> {
        let request = builder
            .build()
            .map_err(|e| ProviderError::transport(operation, e.to_string()))?;

        let span = tracing::span!(
            Level::INFO, "outgoing_http",
            http.method = %request.method(),
            http.url = %redacted(request.url()),
            http.status_code = tracing::field::Empty,
            operation,
        );

        async {
            let response = self
                .inner
                .execute(request)
                .await
                .map_err(|e| ProviderError::transport(operation, e.to_string()))?;
            let status = response.status().as_u16();
            tracing::Span::current().record("http.status_code", status);
            tracing::debug!(status, "provider responded");
            ensure_success(response, operation).await
        }
        .instrument(span)
        .await
    }

    /// [`send`](Self::send) and decode a JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<T, ProviderError> {
        let response = self.send(builder, operation).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::decode(operation, e.to_string()))
    }
}

async fn ensure_success(response: Response, operation: &'static str) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::http(operation, status, body))
}

/// URL without its query string (codes and tokens travel there).
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
