use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::contract::model::Session;

/// Ticket for one render-producing query. Only the latest ticket may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderToken(u64);

impl RenderToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Per-controller session state: the cached session plus a render epoch that
/// lets late query results be recognized and dropped.
///
/// Renders go through [`SessionContext::commit`] or [`SessionContext::reset`],
/// which serialize on one lock so a stale result can never be painted over a
/// newer page.
#[derive(Default)]
pub struct SessionContext {
    session: ArcSwapOption<Session>,
    epoch: AtomicU64,
    commit_lock: Mutex<()>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.session.load_full()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.load().is_some()
    }

    pub fn set(&self, session: Session) {
        self.session.store(Some(Arc::new(session)));
    }

    pub fn clear(&self) {
        self.session.store(None);
    }

    /// Replace the session only if it still belongs to the same user.
    pub fn refresh(&self, session: Session) -> bool {
        let same_user = self
            .session
            .load()
            .as_ref()
            .is_some_and(|s| s.user.id == session.user.id);
        if same_user {
            self.set(session);
        }
        same_user
    }

    /// Issue a new token; every earlier token becomes stale.
    pub fn begin_render(&self) -> RenderToken {
        RenderToken(self.epoch.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, token: RenderToken) -> bool {
        self.epoch.load(Ordering::Acquire) == token.0
    }

    /// Run `apply` only if `token` is still the latest one.
    pub fn commit<R>(&self, token: RenderToken, apply: impl FnOnce() -> R) -> Option<R> {
        let _guard = self.commit_lock.lock();
        self.is_current(token).then(apply)
    }

    /// Run `apply` under the render lock without superseding anything.
    pub fn locked<R>(&self, apply: impl FnOnce() -> R) -> R {
        let _guard = self.commit_lock.lock();
        apply()
    }

    /// Invalidate all in-flight renders, drop the session, then run `apply`.
    pub fn reset<R>(&self, apply: impl FnOnce() -> R) -> R {
        let _guard = self.commit_lock.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.session.store(None);
        apply()
    }
}
