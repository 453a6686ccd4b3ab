use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;
use url::Url;

use crate::contract::model::{MessageRegion, Page};
use crate::domain::ports::PageView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    seq: u64,
}

/// Everything the page needs to draw itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewSnapshot {
    /// Bumped on every change.
    pub version: u64,
    pub page: Page,
    pub user_email: Option<String>,
    pub credits: Option<i64>,
    pub login_message: Option<Message>,
    pub profile_message: Option<Message>,
    /// Last external redirect requested (OAuth authorize URL).
    pub redirect: Option<String>,
}

impl ViewSnapshot {
    pub fn message(&self, region: MessageRegion) -> Option<&Message> {
        match region {
            MessageRegion::Login => self.login_message.as_ref(),
            MessageRegion::Profile => self.profile_message.as_ref(),
        }
    }

    fn slot(&mut self, region: MessageRegion) -> &mut Option<Message> {
        match region {
            MessageRegion::Login => &mut self.login_message,
            MessageRegion::Profile => &mut self.profile_message,
        }
    }
}

/// In-process page display. Every change is broadcast to subscribers
/// (the SSE endpoint) as a full snapshot.
pub struct ViewState {
    inner: Mutex<Inner>,
    updates: broadcast::Sender<ViewSnapshot>,
    error_clear_after: Duration,
}

#[derive(Default)]
struct Inner {
    snapshot: ViewSnapshot,
    next_seq: u64,
}

impl ViewState {
    pub fn new(error_clear_after: Duration) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner::default()),
            updates,
            error_clear_after,
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewSnapshot> {
        self.updates.subscribe()
    }

    fn update(&self, change: impl FnOnce(&mut Inner)) -> ViewSnapshot {
        let snapshot = {
            let mut inner = self.inner.lock();
            change(&mut inner);
            inner.snapshot.version += 1;
            inner.snapshot.clone()
        };
        trace!(version = snapshot.version, page = snapshot.page.as_str(), "view updated");
        // No subscribers is fine.
        let _ = self.updates.send(snapshot.clone());
        snapshot
    }

    fn put_message(&self, region: MessageRegion, kind: MessageKind, text: &str) -> u64 {
        let mut seq = 0;
        self.update(|inner| {
            inner.next_seq += 1;
            seq = inner.next_seq;
            *inner.snapshot.slot(region) = Some(Message {
                kind,
                text: text.to_string(),
                seq,
            });
        });
        seq
    }

    /// Clear `region` unless another message replaced the one tagged `seq`.
    fn clear_message(&self, region: MessageRegion, seq: u64) -> bool {
        let still_there = self
            .inner
            .lock()
            .snapshot
            .message(region)
            .is_some_and(|m| m.seq == seq);
        if still_there {
            self.update(|inner| {
                let slot = inner.snapshot.slot(region);
                if slot.as_ref().is_some_and(|m| m.seq == seq) {
                    *slot = None;
                }
            });
        }
        still_there
    }

    fn schedule_clear(self: &std::sync::Arc<Self>, region: MessageRegion, seq: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let this = std::sync::Arc::downgrade(self);
        let delay = self.error_clear_after;
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(view) = this.upgrade() {
                view.clear_message(region, seq);
            }
        });
    }
}

impl PageView for std::sync::Arc<ViewState> {
    fn show_page(&self, page: Page) {
        self.update(|inner| {
            inner.snapshot.page = page;
            if page == Page::Login {
                inner.snapshot.user_email = None;
                inner.snapshot.credits = None;
            }
        });
    }

    fn show_dashboard(&self, email: &str, credits: i64) {
        self.update(|inner| {
            inner.snapshot.user_email = Some(email.to_string());
            inner.snapshot.credits = Some(credits);
            inner.snapshot.page = Page::Dashboard;
        });
    }

    fn show_error(&self, region: MessageRegion, message: &str) {
        let seq = self.put_message(region, MessageKind::Error, message);
        self.schedule_clear(region, seq);
    }

    fn show_success(&self, region: MessageRegion, message: &str) {
        self.put_message(region, MessageKind::Success, message);
    }

    fn navigate(&self, url: &Url) {
        self.update(|inner| inner.snapshot.redirect = Some(url.to_string()));
    }
}
