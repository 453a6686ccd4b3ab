use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::api::rest::routes;
use crate::config::SessionGateConfig;
use crate::domain::controller::{ControllerConfig, SessionController};
use crate::domain::ports::{IdentityProvider, PageView, ProfileStore};
use crate::infra::provider::{HostedProvider, ProviderSettings};
use crate::infra::view::ViewState;

/// Shown on the dashboard when a profile carries no balance.
pub const DEFAULT_CREDITS: i64 = 5;
pub const SESSION_FILE_NAME: &str = "session.json";

/// The session gate module: controller, view model and their REST surface.
pub struct SessionGate {
    controller: Arc<SessionController>,
    view: Arc<ViewState>,
    app_url: Url,
    shutdown: CancellationToken,
}

impl SessionGate {
    /// Wire the module against the hosted provider described by `cfg`.
    pub fn from_config(cfg: &SessionGateConfig, home_dir: &Path) -> Result<Self> {
        let urls = cfg.validate().context("invalid session_gate config")?;

        let provider = Arc::new(
            HostedProvider::new(ProviderSettings {
                base_url: urls.provider,
                anon_key: cfg.anon_key.clone(),
                profiles_table: cfg.profiles_table.clone(),
                request_timeout: cfg.request_timeout,
                session_file: cfg
                    .persist_session
                    .then(|| home_dir.join(SESSION_FILE_NAME)),
            })
            .context("failed to build provider client")?,
        );

        let view = Arc::new(ViewState::new(cfg.error_clear_after));
        let controller_cfg = ControllerConfig {
            redirect_url: urls.redirect,
            initial_credits: cfg.initial_credits,
            default_credits: DEFAULT_CREDITS,
            transition_delay: cfg.transition_delay,
        };

        Ok(Self::with_ports(
            provider.clone(),
            provider,
            view,
            controller_cfg,
            urls.app,
        ))
    }

    /// Wire the module against arbitrary ports.
    pub fn with_ports(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        view: Arc<ViewState>,
        config: ControllerConfig,
        app_url: Url,
    ) -> Self {
        let page_view: Arc<dyn PageView> = Arc::new(view.clone());
        let shutdown = CancellationToken::new();
        let controller = Arc::new(
            SessionController::new(identity, profiles, page_view, config)
                .with_shutdown(shutdown.clone()),
        );
        Self {
            controller,
            view,
            app_url,
            shutdown,
        }
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    pub fn view(&self) -> &Arc<ViewState> {
        &self.view
    }

    pub fn app_url(&self) -> &Url {
        &self.app_url
    }

    /// Fires on [`stop`](Self::stop); ends controller background work and open
    /// SSE streams.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Subscribe to provider events, then run the initial session check.
    /// The returned handle finishes after [`stop`](Self::stop).
    pub async fn start(&self) -> JoinHandle<()> {
        let listener = self.controller.spawn_listener(self.shutdown.clone());
        let page = self.controller.check_auth().await;
        info!(page = page.map(|p| p.as_str()), "session gate started");
        listener
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn register_rest(self: &Arc<Self>, router: Router) -> Router {
        routes::register_routes(router, Arc::clone(self))
    }
}
