//! Adapter for a Supabase-style hosted provider: OAuth sign-in (PKCE),
//! session refresh and sign-out over `/auth/v1`, profile rows over `/rest/v1`.

pub mod auth;
pub mod client;
pub mod pkce;
pub mod profiles;
pub mod session_file;
pub mod wire;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use crate::contract::model::{AuthEvent, Session};
use crate::domain::error::ProviderError;

pub use client::ProviderHttp;
pub use session_file::{SessionFile, SessionFileError};

/// Refresh the access token when it expires within this many seconds.
pub const REFRESH_MARGIN_SECS: i64 = 30;
/// Sign-in flows not completed within this window are forgotten.
pub const FLOW_TTL: Duration = Duration::from_secs(600);

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: Url,
    pub anon_key: String,
    pub profiles_table: String,
    pub request_timeout: Duration,
    /// Where to persist the session; `None` keeps it in memory only.
    pub session_file: Option<PathBuf>,
}

struct PendingFlow {
    code_verifier: String,
    created_at: Instant,
}

pub struct HostedProvider {
    http: ProviderHttp,
    profiles_table: String,
    session: ArcSwapOption<Session>,
    flows: Mutex<HashMap<String, PendingFlow>>,
    events: broadcast::Sender<AuthEvent>,
    store: Option<SessionFile>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl HostedProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderError::transport("client.build", e.to_string()))?;

        let store = settings.session_file.map(SessionFile::new);
        let restored = store.as_ref().and_then(|file| match file.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable session file");
                None
            }
        });
        if let Some(session) = &restored {
            debug!(user_id = %session.user.id, "restored persisted session");
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            http: ProviderHttp::new(client, settings.base_url, settings.anon_key),
            profiles_table: settings.profiles_table,
            session: ArcSwapOption::new(restored.map(Arc::new)),
            flows: Mutex::new(HashMap::new()),
            events,
            store,
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn http(&self) -> &ProviderHttp {
        &self.http
    }

    /// Session held by the adapter, without refreshing it.
    pub fn cached_session(&self) -> Option<Arc<Session>> {
        self.session.load_full()
    }

    pub fn pending_flows(&self) -> usize {
        self.flows.lock().len()
    }

    fn store_session(&self, session: &Session) {
        self.session.store(Some(Arc::new(session.clone())));
        if let Some(file) = &self.store {
            if let Err(e) = file.save(session) {
                warn!(error = %e, "failed to persist session");
            }
        }
    }

    fn drop_session(&self) -> Option<Arc<Session>> {
        let previous = self.session.swap(None);
        if let Some(file) = &self.store {
            if let Err(e) = file.remove() {
                warn!(error = %e, "failed to remove persisted session");
            }
        }
        previous
    }

    fn emit(&self, event: AuthEvent) {
        debug!(event = event.name(), "auth event");
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn remember_flow(&self, flow_id: String, code_verifier: String) {
        let mut flows = self.flows.lock();
        flows.retain(|_, f| f.created_at.elapsed() < FLOW_TTL);
        flows.insert(
            flow_id,
            PendingFlow {
                code_verifier,
                created_at: Instant::now(),
            },
        );
    }

    fn take_flow(&self, flow_id: &str) -> Option<String> {
        self.flows
            .lock()
            .remove(flow_id)
            .filter(|f| f.created_at.elapsed() < FLOW_TTL)
            .map(|f| f.code_verifier)
    }
}
