#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;

use session_gate::domain::controller::ControllerConfig;
use session_gate::domain::error::ProviderError;
use session_gate::domain::ports::{IdentityProvider, ProfileStore};
use session_gate::infra::view::ViewState;
use session_gate::model::{AuthEvent, NewProfile, OAuthProvider, Profile, Session, SessionUser};
use session_gate::SessionGate;

pub const AUTHORIZE_URL: &str = "https://provider.example.com/auth/v1/authorize?provider=google";
pub const APP_URL: &str = "http://127.0.0.1:8087/";

pub fn session_for(id: Uuid, email: &str, provider: &str) -> Session {
    Session {
        user: SessionUser {
            id,
            email: Some(email.to_string()),
            provider: provider.to_string(),
        },
        access_token: format!("token-{id}"),
        refresh_token: Some("refresh".to_string()),
        expires_at: None,
    }
}

pub fn session() -> Session {
    session_for(Uuid::new_v4(), "ada@example.com", "google")
}

pub fn profile_for(session: &Session, credits: Option<i64>) -> Profile {
    Profile {
        id: session.user.id,
        display_name: "Ada".to_string(),
        age_range: Some("25-34".to_string()),
        city: "London".to_string(),
        bio: None,
        login_method: Some(session.user.provider.clone()),
        credits_balance: credits,
    }
}

/// In-memory identity provider with scripted outcomes.
pub struct MockIdentity {
    session: Mutex<Option<Session>>,
    current_error: Mutex<Option<ProviderError>>,
    sign_in_error: Mutex<Option<ProviderError>>,
    sign_out_error: Mutex<Option<ProviderError>>,
    events: broadcast::Sender<AuthEvent>,
    pub current_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl MockIdentity {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(16)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(capacity);
        Arc::new(Self {
            session: Mutex::new(None),
            current_error: Mutex::new(None),
            sign_in_error: Mutex::new(None),
            sign_out_error: Mutex::new(None),
            events,
            current_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock() = session;
    }

    pub fn fail_current(&self, e: ProviderError) {
        *self.current_error.lock() = Some(e);
    }

    pub fn fail_sign_in(&self, e: ProviderError) {
        *self.sign_in_error.lock() = Some(e);
    }

    pub fn fail_sign_out(&self, e: ProviderError) {
        *self.sign_out_error.lock() = Some(e);
    }

    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn current_session(&self) -> Result<Option<Session>, ProviderError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.current_error.lock().clone() {
            return Err(e);
        }
        Ok(self.session.lock().clone())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, ProviderError> {
        if let Some(e) = self.sign_in_error.lock().clone() {
            return Err(e);
        }
        let mut url = Url::parse(AUTHORIZE_URL).expect("static url");
        url.query_pairs_mut()
            .clear()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to.as_str());
        Ok(url)
    }

    async fn exchange_code(&self, code: &str, _flow: &str) -> Result<Session, ProviderError> {
        if code != "good-code" {
            return Err(ProviderError::http("auth.exchange_code", 400, "invalid grant"));
        }
        let session = session();
        self.set_session(Some(session.clone()));
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.set_session(None);
        self.emit(AuthEvent::SignedOut);
        match self.sign_out_error.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// In-memory `profiles` collection.
#[derive(Default)]
pub struct MockProfiles {
    rows: Mutex<HashMap<Uuid, Profile>>,
    find_error: Mutex<Option<ProviderError>>,
    insert_error: Mutex<Option<ProviderError>>,
    find_delay: Mutex<Option<Duration>>,
    pub inserts: Mutex<Vec<NewProfile>>,
    pub finds: AtomicUsize,
}

impl MockProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, profile: Profile) {
        self.rows.lock().insert(profile.id, profile);
    }

    pub fn fail_find(&self, e: ProviderError) {
        *self.find_error.lock() = Some(e);
    }

    pub fn fail_insert(&self, e: ProviderError) {
        *self.insert_error.lock() = Some(e);
    }

    /// Delay every lookup; use with paused time.
    pub fn delay_find(&self, delay: Duration) {
        *self.find_delay.lock() = Some(delay);
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.lock().len()
    }
}

#[async_trait]
impl ProfileStore for MockProfiles {
    async fn find_profile(&self, session: &Session) -> Result<Option<Profile>, ProviderError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let delay = *self.find_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.find_error.lock().clone() {
            return Err(e);
        }
        Ok(self.rows.lock().get(&session.user.id).cloned())
    }

    async fn insert_profile(
        &self,
        _session: &Session,
        profile: NewProfile,
    ) -> Result<(), ProviderError> {
        if let Some(e) = self.insert_error.lock().clone() {
            return Err(e);
        }
        self.inserts.lock().push(profile.clone());
        self.put(Profile {
            id: profile.id,
            display_name: profile.display_name,
            age_range: profile.age_range,
            city: profile.city,
            bio: profile.bio,
            login_method: Some(profile.login_method),
            credits_balance: Some(profile.credits_balance),
        });
        Ok(())
    }
}

pub fn controller_config() -> ControllerConfig {
    ControllerConfig {
        redirect_url: Url::parse("http://127.0.0.1:8087/auth/callback").expect("static url"),
        initial_credits: 5,
        default_credits: 5,
        transition_delay: Duration::from_secs(1),
    }
}

pub struct Harness {
    pub identity: Arc<MockIdentity>,
    pub profiles: Arc<MockProfiles>,
    pub gate: Arc<SessionGate>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_identity(MockIdentity::new())
    }

    pub fn with_identity(identity: Arc<MockIdentity>) -> Self {
        let profiles = MockProfiles::new();
        let view = Arc::new(ViewState::new(Duration::from_secs(5)));
        let gate = Arc::new(SessionGate::with_ports(
            identity.clone(),
            profiles.clone(),
            view,
            controller_config(),
            Url::parse(APP_URL).expect("static url"),
        ));
        Self {
            identity,
            profiles,
            gate,
        }
    }

    /// Signed-in user without a profile row.
    pub fn signed_in(&self) -> Session {
        let session = session();
        self.identity.set_session(Some(session.clone()));
        session
    }

    pub fn view(&self) -> &Arc<ViewState> {
        self.gate.view()
    }
}

/// Poll `cond` until it holds, yielding to spawned tasks in between.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
