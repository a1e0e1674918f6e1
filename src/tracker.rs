//! Active-session bookkeeping.
//!
//! Tracks in-flight generation sessions, enforces a concurrency limit, and
//! provides an explicit drain barrier: cancel every live session and wait
//! until the last one has released its slot. Guards clean up on drop, so
//! abandoned streams free their slot without cooperation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Registry of active generation sessions.
pub struct SessionTracker {
    /// Cancellation tokens of live sessions, keyed by session ID.
    active: Mutex<HashMap<Uuid, CancellationToken>>,
    /// Signalled each time the active set becomes empty.
    idle: Notify,
    /// Semaphore limiting concurrent sessions.
    limit: Arc<Semaphore>,
    max_concurrent: usize,
}

/// A guard holding one session slot.
///
/// Dropping the guard cancels the session's token and frees the slot, so
/// a consumer that stops polling its stream still releases resources.
pub struct SessionGuard {
    id: Uuid,
    cancel: CancellationToken,
    tracker: Arc<SessionTracker>,
    _permit: OwnedSemaphorePermit,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token observed by this session's generation loop. Cancelled by the
    /// caller's parent token, by [`SessionTracker::cancel_all`], or by
    /// dropping the guard.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        let mut active = self.tracker.active.lock().unwrap();
        active.remove(&self.id);
        if active.is_empty() {
            self.tracker.idle.notify_waiters();
        }
    }
}

impl SessionTracker {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(HashMap::new()),
            idle: Notify::new(),
            limit: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    /// Acquire a session slot, blocking while at the concurrency limit.
    ///
    /// The guard's token is a child of `parent`, so caller-side
    /// cancellation reaches the session without the tracker needing to
    /// know about it.
    pub async fn acquire(self: &Arc<Self>, parent: CancellationToken) -> SessionGuard {
        let permit = Arc::clone(&self.limit)
            .acquire_owned()
            .await
            .expect("session semaphore closed");

        let id = Uuid::new_v4();
        let cancel = parent.child_token();
        self.active.lock().unwrap().insert(id, cancel.clone());

        SessionGuard {
            id,
            cancel,
            tracker: Arc::clone(self),
            _permit: permit,
        }
    }

    /// Cancel every live session's token.
    pub fn cancel_all(&self) {
        for token in self.active.lock().unwrap().values() {
            token.cancel();
        }
    }

    /// Cancel all sessions and wait until every guard has been dropped.
    pub async fn drain(&self) {
        self.cancel_all();
        loop {
            let notified = self.idle.notified();
            if self.active.lock().unwrap().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Number of currently active sessions.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available_permits(&self) -> usize {
        self.limit.available_permits()
    }
}
