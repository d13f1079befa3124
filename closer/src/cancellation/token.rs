//! Cancellation token for cooperative cancellation with an optional deadline.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::warn;

use crate::errors::CancelledError;

/// Reason recorded when a token passes its deadline.
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
/// A token may carry a deadline; once it passes, the token reports itself
/// cancelled with [`DEADLINE_EXCEEDED`].
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation.
    callbacks: RwLock<Vec<CancelCallback>>,
    /// Children to cancel along with this token. Dead or cancelled entries
    /// are pruned whenever a child is added.
    children: Mutex<Vec<Weak<Self>>>,
    /// Point in time after which the token counts as cancelled.
    deadline: Option<Instant>,
    /// Wakes tasks waiting in [`CancellationToken::cancelled`].
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root token that is never cancelled unless asked to.
    #[must_use]
    pub fn background() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Creates a token that counts as cancelled once `deadline` passes.
    ///
    /// Nothing is armed here; see [`crate::cancellation::with_timeout`] for
    /// tokens that also fire their callbacks on time.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    /// Creates a child token that is cancelled whenever `parent` is.
    ///
    /// The child inherits the parent's deadline. Cancelling the child does
    /// not affect the parent.
    #[must_use]
    pub fn child(parent: &Arc<Self>) -> Arc<Self> {
        Self::child_with_deadline(parent, parent.deadline)
    }

    /// Creates a child token with the earlier of `deadline` and the parent's.
    pub(crate) fn child_with_deadline(parent: &Arc<Self>, deadline: Option<Instant>) -> Arc<Self> {
        let deadline = match (parent.deadline, deadline) {
            (Some(p), Some(d)) => Some(p.min(d)),
            (p, d) => p.or(d),
        };
        let child = Arc::new(Self {
            deadline,
            ..Self::default()
        });

        let parent_cancelled = {
            let mut children = parent.children.lock();
            children.retain(|c| c.upgrade().is_some_and(|c| !c.cancelled.load(Ordering::SeqCst)));
            // Checked under the lock so a racing cancel either drains this
            // child or is seen here.
            if parent.cancelled.load(Ordering::SeqCst) {
                true
            } else {
                children.push(Arc::downgrade(&child));
                false
            }
        };
        if parent_cancelled {
            child.cancel(parent.reason().unwrap_or_default());
        }

        child
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept.
    /// Live children are cancelled with the same reason, then callbacks are
    /// invoked once, on the cancelling thread. Panics in callbacks are logged
    /// and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        {
            // The flag flips under the reason lock, so anyone who sees it
            // set also sees the reason.
            let mut slot = self.reason.write();
            if self
                .cancelled
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }
            *slot = Some(reason.clone());
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(reason.as_str());
        }

        // Taken under the write lock so a racing on_cancel either lands in
        // this batch or observes the flag and runs inline.
        let callbacks = std::mem::take(&mut *self.callbacks.write());
        for callback in &callbacks {
            run_callback(callback.as_ref());
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        {
            let mut callbacks = self.callbacks.write();
            if !self.cancelled.load(Ordering::SeqCst) {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        run_callback(&callback);
    }

    /// Returns whether cancellation has been requested or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.cancel(DEADLINE_EXCEEDED);
            return true;
        }
        false
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        if !self.is_cancelled() {
            return None;
        }
        self.reason.read().clone()
    }

    /// Returns the deadline, if the token has one.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline.
    ///
    /// `None` when the token has no deadline; zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns an error if the token is cancelled.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError::new(self.reason().unwrap_or_default()))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_children(&self) -> usize {
        self.children.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn pending_callbacks(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Waits until the token is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = notified => {}
                        () = tokio::time::sleep_until(deadline.into()) => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}

fn run_callback(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .field("reason", &*self.reason.read())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
        assert!(token.deadline().is_none());
        assert!(token.remaining().is_none());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_token_cancel() {
        let token = CancellationToken::new();
        token.cancel("User requested");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("User requested".to_string()));
        assert_eq!(token.check(), Err(CancelledError::new("User requested")));
    }

    #[test]
    fn test_token_cancel_idempotent() {
        let token = CancellationToken::new();
        token.cancel("First reason");
        token.cancel("Second reason");

        // First reason wins
        assert_eq!(token.reason(), Some("First reason".to_string()));
    }

    #[test]
    fn test_on_cancel_before_cancellation() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        token.on_cancel(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 0);

        token.cancel("test");
        token.cancel("again");

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_cancel_after_cancellation() {
        let token = CancellationToken::new();
        token.cancel("test");

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        // Should invoke immediately
        token.on_cancel(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_panic_suppressed() {
        let token = CancellationToken::new();

        token.on_cancel(|| {
            panic!("Intentional panic");
        });

        // Should not panic
        token.cancel("test");
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_callback_may_register_callbacks() {
        let token = Arc::new(CancellationToken::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_token = Arc::downgrade(&token);
        let inner_counter = counter.clone();
        token.on_cancel(move || {
            if let Some(token) = inner_token.upgrade() {
                let counter = inner_counter.clone();
                token.on_cancel(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        token.cancel("nested");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_elapsed_deadline_counts_as_cancelled() {
        let token = CancellationToken::with_deadline(Instant::now());

        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some(DEADLINE_EXCEEDED));
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_future_deadline_not_cancelled() {
        let token = CancellationToken::with_deadline(Instant::now() + Duration::from_secs(60));

        assert!(!token.is_cancelled());
        assert!(token.remaining().is_some_and(|r| r > Duration::from_secs(30)));
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancellationToken::background();
        let child = CancellationToken::child(&parent);

        assert!(!child.is_cancelled());
        parent.cancel("shutdown");

        assert!(child.is_cancelled());
        assert_eq!(child.reason(), Some("shutdown".to_string()));
    }

    #[test]
    fn test_child_cancel_leaves_parent() {
        let parent = CancellationToken::background();
        let child = CancellationToken::child(&parent);

        child.cancel("local");

        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let parent = CancellationToken::background();
        parent.cancel("already");

        let child = CancellationToken::child(&parent);
        assert_eq!(child.reason(), Some("already".to_string()));
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let soon = Instant::now() + Duration::from_secs(1);
        let later = soon + Duration::from_secs(60);
        let parent = Arc::new(CancellationToken::with_deadline(soon));

        let child = CancellationToken::child_with_deadline(&parent, Some(later));
        assert_eq!(child.deadline(), Some(soon));
    }

    #[test]
    fn test_parent_does_not_accumulate_finished_children() {
        let parent = CancellationToken::background();

        for i in 0..10_000 {
            let child = CancellationToken::child(&parent);
            if i % 2 == 0 {
                child.cancel("child done");
            }
        }

        // At most the last child is still listed until the next add.
        assert!(parent.tracked_children() <= 1);
        assert_eq!(parent.pending_callbacks(), 0);

        let live = CancellationToken::child(&parent);
        assert_eq!(parent.tracked_children(), 1);

        parent.cancel("shutdown");
        assert_eq!(live.reason(), Some("shutdown".to_string()));
        assert_eq!(parent.tracked_children(), 0);
    }

    #[test]
    fn test_grandchild_follows_root() {
        let root = CancellationToken::background();
        let child = CancellationToken::child(&root);
        let grandchild = CancellationToken::child(&child);

        root.cancel("root stopped");
        assert_eq!(grandchild.reason(), Some("root stopped".to_string()));
    }

    #[test]
    fn test_concurrent_check_always_sees_reason() {
        for _ in 0..100 {
            let token = CancellationToken::background();
            let readers: Vec<_> = (0..2)
                .map(|_| {
                    let token = token.clone();
                    std::thread::spawn(move || loop {
                        if let Err(e) = token.check() {
                            return e;
                        }
                        std::hint::spin_loop();
                    })
                })
                .collect();

            token.cancel("racing");
            for reader in readers {
                let err = reader.join().expect("reader joined");
                assert_eq!(err.reason, "racing");
            }
        }
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_cancel() {
        let token = CancellationToken::background();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::task::yield_now().await;
        token.cancel("done");

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter finished")
            .expect("waiter joined");
    }

    #[tokio::test]
    async fn test_cancelled_resolves_at_deadline() {
        let token = CancellationToken::with_deadline(Instant::now() + Duration::from_millis(20));

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("deadline reached");
        assert_eq!(token.reason().as_deref(), Some(DEADLINE_EXCEEDED));
    }

    #[test]
    fn test_cancelled_ready_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel("early");

        tokio_test::block_on(token.cancelled());
    }
}
