//! Per-request session context.
//!
//! The session middleware loads (or creates) a [`SessionRecord`], wraps it in
//! a [`SessionHandle`], and inserts the handle into request extensions. Route
//! handlers and later middleware mutate session state only through the
//! handle; the middleware persists the record once, after the inner chain has
//! produced its response. There is no ambient session state anywhere.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::{
    entities::{FlashMessage, SessionRecord, UserRecord},
    tokens::{new_csrf_token, new_session_id},
};

/// The resolved acting user, attached to request extensions for the
/// remainder of the current request only.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<UserRecord>);

/// Values copied out of the session for every subsequently rendered view.
///
/// Recomputed on each request at context-construction time, so
/// `is_authenticated` always reflects the session flag *now*, not at session
/// creation and not whether a user lookup succeeded.
#[derive(Debug, Clone, Default)]
pub struct TemplateLocals {
    pub is_authenticated: bool,
    pub csrf_token: String,
}

#[derive(Debug)]
struct SessionInner {
    record: Mutex<SessionRecord>,
    dirty: AtomicBool,
    destroyed: AtomicBool,
    fresh: bool,
}

/// Shared mutable view of the current request's session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    /// Wrap a record loaded from the store.
    pub fn resumed(record: SessionRecord) -> Self {
        Self::wrap(record, false)
    }

    /// Create a brand-new session record. Marked dirty so it is persisted
    /// even when no handler touches it.
    pub fn started(ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        let record = SessionRecord {
            id: new_session_id(),
            user_id: None,
            is_logged_in: false,
            csrf_token: new_csrf_token(),
            flash: Vec::new(),
            created_at: now,
            expires_at: now + ttl,
        };
        let handle = Self::wrap(record, true);
        handle.inner.dirty.store(true, Ordering::Relaxed);
        handle
    }

    fn wrap(record: SessionRecord, fresh: bool) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                record: Mutex::new(record),
                dirty: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                fresh,
            }),
        }
    }

    fn with_record<T>(&self, f: impl FnOnce(&mut SessionRecord) -> T) -> T {
        let mut record = self
            .inner
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut record)
    }

    pub fn id(&self) -> String {
        self.with_record(|r| r.id.clone())
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.with_record(|r| r.user_id)
    }

    pub fn is_logged_in(&self) -> bool {
        self.with_record(|r| r.is_logged_in)
    }

    pub fn csrf_token(&self) -> String {
        self.with_record(|r| r.csrf_token.clone())
    }

    /// Whether this request created the session (drives `Set-Cookie`).
    pub fn is_fresh(&self) -> bool {
        self.inner.fresh
    }

    pub fn locals(&self) -> TemplateLocals {
        self.with_record(|r| TemplateLocals {
            is_authenticated: r.is_logged_in,
            csrf_token: r.csrf_token.clone(),
        })
    }

    /// Bind the session to a user after successful credential verification.
    pub fn log_in(&self, user: Uuid) {
        self.with_record(|r| {
            r.user_id = Some(user);
            r.is_logged_in = true;
        });
        self.mark_dirty();
    }

    /// Flag the session for destruction at end of request.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Relaxed);
    }

    pub fn push_flash(&self, message: FlashMessage) {
        self.with_record(|r| r.flash.push(message));
        self.mark_dirty();
    }

    /// Drain the flash queue. Draining counts as a mutation so the emptied
    /// queue is persisted and the messages show exactly once.
    pub fn take_flash(&self) -> Vec<FlashMessage> {
        let drained = self.with_record(|r| std::mem::take(&mut r.flash));
        if !drained.is_empty() {
            self.mark_dirty();
        }
        drained
    }

    fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::Relaxed);
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Relaxed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Relaxed)
    }

    /// Copy of the current record, with the expiry slid forward, for the
    /// end-of-request write-back.
    pub fn snapshot(&self, ttl: Duration) -> SessionRecord {
        self.with_record(|r| {
            let mut record = r.clone();
            record.expires_at = OffsetDateTime::now_utc() + ttl;
            record
        })
    }
}
