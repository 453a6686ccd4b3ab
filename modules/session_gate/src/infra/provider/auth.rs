use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::wire::{PkceGrant, RefreshGrant, TokenResponse};
use super::{pkce, HostedProvider, REFRESH_MARGIN_SECS};
use crate::contract::model::{AuthEvent, OAuthProvider, Session};
use crate::domain::error::ProviderError;
use crate::domain::ports::IdentityProvider;

/// Query parameter carrying the flow id back to the callback.
pub const FLOW_PARAM: &str = "flow";

impl HostedProvider {
    async fn refresh(&self, stale: &Session) -> Result<Option<Session>, ProviderError> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(current) = self.session.load_full() {
            if current.access_token != stale.access_token {
                return Ok(Some((*current).clone()));
            }
        } else {
            return Ok(None);
        }

        let Some(refresh_token) = stale.refresh_token.as_deref() else {
            info!(user_id = %stale.user.id, "session expired without refresh token");
            self.drop_session();
            self.emit(AuthEvent::SignedOut);
            return Ok(None);
        };

        let mut url = self.http.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let request = self
            .http
            .request(Method::POST, url, None)
            .json(&RefreshGrant { refresh_token });

        match self
            .http
            .send_json::<TokenResponse>(request, "auth.refresh")
            .await
        {
            Ok(token) => {
                let session = token.into_session(Utc::now());
                debug!(user_id = %session.user.id, "access token refreshed");
                self.store_session(&session);
                self.emit(AuthEvent::TokenRefreshed(session.clone()));
                Ok(Some(session))
            }
            Err(e) if e.is_rejection() => {
                warn!(error = %e, "refresh rejected, signing out");
                self.drop_session();
                self.emit(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl IdentityProvider for HostedProvider {
    #[instrument(name = "session_gate.provider.current_session", skip(self))]
    async fn current_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(session) = self.session.load_full() else {
            return Ok(None);
        };
        let margin = chrono::Duration::seconds(REFRESH_MARGIN_SECS);
        if session.expires_within(Utc::now(), margin) {
            return self.refresh(&session).await;
        }
        Ok(Some((*session).clone()))
    }

    #[instrument(
        name = "session_gate.provider.sign_in_with_oauth",
        skip_all,
        fields(provider = %provider)
    )]
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, ProviderError> {
        let verifier = pkce::generate_code_verifier();
        let challenge = pkce::generate_code_challenge(&verifier);
        let flow_id = pkce::generate_flow_id();

        let mut return_url = redirect_to.clone();
        return_url.query_pairs_mut().append_pair(FLOW_PARAM, &flow_id);

        let mut url = self.http.endpoint(&["auth", "v1", "authorize"])?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", return_url.as_str())
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "s256");

        self.remember_flow(flow_id, verifier);
        Ok(url)
    }

    #[instrument(name = "session_gate.provider.exchange_code", skip_all)]
    async fn exchange_code(&self, code: &str, flow: &str) -> Result<Session, ProviderError> {
        let verifier = self.take_flow(flow).ok_or(ProviderError::UnknownFlow)?;

        let mut url = self.http.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");
        let request = self.http.request(Method::POST, url, None).json(&PkceGrant {
            auth_code: code,
            code_verifier: &verifier,
        });

        let token: TokenResponse = self.http.send_json(request, "auth.exchange_code").await?;
        let session = token.into_session(Utc::now());

        self.store_session(&session);
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    #[instrument(name = "session_gate.provider.sign_out", skip(self))]
    async fn sign_out(&self) -> Result<(), ProviderError> {
        let previous = self.drop_session();

        let remote = match previous {
            Some(session) => match self.http.endpoint(&["auth", "v1", "logout"]) {
                Ok(url) => {
                    let request =
                        self.http
                            .request(Method::POST, url, Some(&session.access_token));
                    self.http.send(request, "auth.sign_out").await.map(|_| ())
                }
                Err(e) => Err(e),
            },
            None => Ok(()),
        };

        self.emit(AuthEvent::SignedOut);
        remote
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
