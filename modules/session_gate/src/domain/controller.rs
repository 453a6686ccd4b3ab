use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::contract::model::{
    AuthEvent, MessageRegion, NewProfile, OAuthProvider, Page, ProfileForm, Session,
};
use crate::domain::context::{RenderToken, SessionContext};
use crate::domain::error::DomainError;
use crate::domain::ports::{IdentityProvider, PageView, ProfileStore};

pub const REQUIRED_FIELDS_MESSAGE: &str = "Please fill in all required fields";
pub const PROFILE_CREATED_MESSAGE: &str = "✓ Profile created!";
pub const PROFILE_SAVE_FAILED_MESSAGE: &str = "Failed to save profile. Please try again.";
pub const CALLBACK_FAILED_MESSAGE: &str = "Failed to complete sign in. Please try again.";

pub fn sign_in_failed_message(provider: OAuthProvider) -> String {
    format!(
        "Failed to sign in with {}. Please try again.",
        provider.display_name()
    )
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Where the provider sends the browser after OAuth.
    pub redirect_url: Url,
    /// Credits granted on profile creation.
    pub initial_credits: i64,
    /// Shown on the dashboard when the stored balance is null.
    pub default_credits: i64,
    /// Pause between "profile created" and the dashboard transition.
    pub transition_delay: Duration,
}

/// Session Controller: drives the page display from session and profile state.
///
/// Every render-producing path takes a [`RenderToken`] first; results that
/// come back after a newer path started are dropped.
pub struct SessionController {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    view: Arc<dyn PageView>,
    ctx: SessionContext,
    config: ControllerConfig,
    shutdown: CancellationToken,
}

impl SessionController {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        view: Arc<dyn PageView>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            identity,
            profiles,
            view,
            ctx: SessionContext::new(),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Background work spawned by the controller ends when `token` fires.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Look up the provider session and render login or go on to the profile
    /// check. Returns the rendered page, or `None` if superseded.
    #[instrument(name = "session_gate.controller.check_auth", skip(self))]
    pub async fn check_auth(&self) -> Option<Page> {
        let token = self.ctx.begin_render();

        let session = match self.identity.current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "session lookup failed, treating as signed out");
                None
            }
        };

        match session {
            None => self.ctx.commit(token, || {
                self.ctx.clear();
                self.view.show_page(Page::Login);
                Page::Login
            }),
            Some(session) => {
                self.ctx.commit(token, || self.ctx.set(session.clone()))?;
                self.render_profile(&session, token).await
            }
        }
    }

    /// Re-run the profile lookup for the cached session.
    #[instrument(name = "session_gate.controller.check_profile", skip(self))]
    pub async fn check_profile(&self) -> Option<Page> {
        let token = self.ctx.begin_render();
        let Some(session) = self.ctx.current() else {
            debug!("profile check without a session");
            return self.ctx.commit(token, || {
                self.view.show_page(Page::Login);
                Page::Login
            });
        };
        self.render_profile(&session, token).await
    }

    async fn render_profile(&self, session: &Session, token: RenderToken) -> Option<Page> {
        let lookup = self.profiles.find_profile(session).await;

        let rendered = self.ctx.commit(token, || match lookup {
            Ok(Some(profile)) => {
                let credits = profile
                    .credits_balance
                    .unwrap_or(self.config.default_credits);
                let email = session.user.email.as_deref().unwrap_or_default();
                self.view.show_dashboard(email, credits);
                Page::Dashboard
            }
            Ok(None) => {
                debug!(user_id = %session.user.id, "no profile row yet");
                self.view.show_page(Page::ProfileCreation);
                Page::ProfileCreation
            }
            Err(e) => {
                warn!(user_id = %session.user.id, error = %e, "profile lookup failed");
                self.view.show_page(Page::ProfileCreation);
                Page::ProfileCreation
            }
        });

        if rendered.is_none() {
            debug!(token = token.value(), "discarding stale profile result");
        }
        rendered
    }

    /// Start the OAuth redirect flow for `provider`.
    #[instrument(name = "session_gate.controller.sign_in", skip_all, fields(provider = %provider))]
    pub async fn sign_in(&self, provider: OAuthProvider) -> Result<Url, DomainError> {
        match self
            .identity
            .sign_in_with_oauth(provider, &self.config.redirect_url)
            .await
        {
            Ok(url) => {
                info!("redirecting to provider");
                self.view.navigate(&url);
                Ok(url)
            }
            Err(e) => {
                error!(error = %e, "sign in error");
                self.view
                    .show_error(MessageRegion::Login, &sign_in_failed_message(provider));
                Err(DomainError::sign_in(provider.as_str(), e))
            }
        }
    }

    /// Finish the redirect flow. Rendering follows from the provider's
    /// `SignedIn` notification.
    #[instrument(name = "session_gate.controller.complete_sign_in", skip_all)]
    pub async fn complete_sign_in(&self, code: &str, flow: &str) -> Result<(), DomainError> {
        match self.identity.exchange_code(code, flow).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "sign in completed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "sign in callback error");
                self.show_callback_failure();
                Err(DomainError::Callback(e))
            }
        }
    }

    /// The provider redirected back without a usable code.
    #[instrument(name = "session_gate.controller.reject_callback", skip(self))]
    pub fn reject_callback(&self, reason: &str) {
        warn!("sign in callback rejected");
        self.show_callback_failure();
    }

    /// A cached session keeps whatever page it already rendered; only a
    /// signed-out user is sent back to login.
    fn show_callback_failure(&self) {
        self.ctx.locked(|| {
            if self.ctx.is_signed_in() {
                debug!("callback failed while signed in, keeping current page");
            } else {
                self.view.show_page(Page::Login);
            }
            self.view
                .show_error(MessageRegion::Login, CALLBACK_FAILED_MESSAGE);
        });
    }

    /// Validate the form, insert the profile and schedule the transition to
    /// the dashboard.
    #[instrument(name = "session_gate.controller.save_profile", skip_all)]
    pub async fn save_profile(self: &Arc<Self>, form: ProfileForm) -> Result<(), DomainError> {
        let display_name = form.display_name.trim();
        let city = form.city.trim();

        let mut missing = Vec::new();
        if display_name.is_empty() {
            missing.push("display_name");
        }
        if city.is_empty() {
            missing.push("city");
        }
        if !missing.is_empty() {
            self.view
                .show_error(MessageRegion::Profile, REQUIRED_FIELDS_MESSAGE);
            return Err(DomainError::missing_required_fields(missing));
        }

        let Some(session) = self.ctx.current() else {
            warn!("profile save without a session");
            self.view.show_page(Page::Login);
            return Err(DomainError::NotSignedIn);
        };

        let profile = NewProfile {
            id: session.user.id,
            display_name: display_name.to_string(),
            age_range: non_blank(&form.age_range),
            city: city.to_string(),
            bio: non_blank(&form.bio),
            login_method: session.user.provider.clone(),
            credits_balance: self.config.initial_credits,
        };

        if let Err(e) = self.profiles.insert_profile(&session, profile).await {
            error!(error = %e, "profile save error");
            self.view
                .show_error(MessageRegion::Profile, PROFILE_SAVE_FAILED_MESSAGE);
            return Err(DomainError::ProfileSave(e));
        }

        info!(user_id = %session.user.id, "profile created");
        self.view
            .show_success(MessageRegion::Profile, PROFILE_CREATED_MESSAGE);

        let this = Arc::clone(self);
        let delay = self.config.transition_delay;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => debug!("stopping, dashboard transition skipped"),
                _ = tokio::time::sleep(delay) => {
                    this.check_profile().await;
                }
            }
        });
        Ok(())
    }

    /// Terminate the session and show the login page, whatever the provider says.
    #[instrument(name = "session_gate.controller.sign_out", skip(self))]
    pub async fn sign_out(&self) -> Page {
        if let Err(e) = self.identity.sign_out().await {
            warn!(error = %e, "provider sign out failed, clearing local session anyway");
        }
        self.ctx.reset(|| {
            self.view.show_page(Page::Login);
            Page::Login
        })
    }

    /// React to a provider notification. Repeating an event yields the same render.
    #[instrument(name = "session_gate.controller.handle_event", skip_all, fields(event = event.name()))]
    pub async fn handle_event(&self, event: AuthEvent) -> Option<Page> {
        match event {
            AuthEvent::SignedIn(session) => {
                let token = self.ctx.begin_render();
                self.ctx.commit(token, || self.ctx.set(session.clone()))?;
                self.render_profile(&session, token).await
            }
            AuthEvent::SignedOut => Some(self.ctx.reset(|| {
                self.view.show_page(Page::Login);
                Page::Login
            })),
            AuthEvent::TokenRefreshed(session) => {
                if !self.ctx.refresh(session) {
                    debug!("refreshed session does not match the cached user");
                }
                None
            }
        }
    }

    /// Subscribe to provider notifications and feed them to
    /// [`handle_event`](Self::handle_event) until `cancel` fires.
    ///
    /// The subscription is taken before this returns, so nothing emitted after
    /// the call is missed.
    pub fn spawn_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut events = self.identity.subscribe();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("session listener stopped");
                        break;
                    }
                    received = events.recv() => match received {
                        Ok(event) => {
                            this.handle_event(event).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "session listener lagged, re-checking session");
                            this.check_auth().await;
                        }
                        Err(RecvError::Closed) => {
                            debug!("provider event channel closed");
                            break;
                        }
                    },
                }
            }
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
