//! Constructors for tokens that cancel themselves after a timeout.

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::token::{CancellationToken, DEADLINE_EXCEEDED};

/// Timeout applied by [`short_token`] and [`short_token_with_parent`].
pub const SHORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns a fresh token cancelled after [`SHORT_TIMEOUT`].
#[must_use]
pub fn short_token() -> Arc<CancellationToken> {
    with_timeout(None, SHORT_TIMEOUT)
}

/// Returns a child of `parent` cancelled after [`SHORT_TIMEOUT`].
///
/// The child is also cancelled as soon as the parent is, and never outlives
/// the parent's own deadline.
#[must_use]
pub fn short_token_with_parent(parent: &Arc<CancellationToken>) -> Arc<CancellationToken> {
    with_timeout(Some(parent), SHORT_TIMEOUT)
}

/// Returns a fresh token cancelled after `timeout`.
#[must_use]
pub fn timeout_token(timeout: Duration) -> Arc<CancellationToken> {
    with_timeout(None, timeout)
}

/// Builds a token with a deadline `timeout` from now and arms its timer.
///
/// The timer runs as a Tokio task when called inside a runtime and on a
/// helper thread otherwise. It only holds a weak reference to the token and
/// stops as soon as the token is cancelled or dropped.
#[must_use]
pub fn with_timeout(parent: Option<&Arc<CancellationToken>>, timeout: Duration) -> Arc<CancellationToken> {
    let deadline = Instant::now().checked_add(timeout);
    let token = match parent {
        Some(parent) => CancellationToken::child_with_deadline(parent, deadline),
        None => Arc::new(deadline.map_or_else(CancellationToken::new, CancellationToken::with_deadline)),
    };

    if let Some(deadline) = token.deadline() {
        arm_timer(&token, deadline);
    }
    token
}

fn arm_timer(token: &Arc<CancellationToken>, deadline: Instant) {
    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        spawn_timer_task(&runtime, token, deadline);
        return;
    }

    if let Err(e) = spawn_timer_thread(token, deadline) {
        // The deadline is still observed lazily by is_cancelled().
        warn!(error = %e, "Failed to spawn timeout thread");
    }
}

fn spawn_timer_task(
    runtime: &tokio::runtime::Handle,
    token: &Arc<CancellationToken>,
    deadline: Instant,
) -> tokio::task::JoinHandle<()> {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    // The sender is dropped when the callbacks run or the token is dropped.
    let stop_tx = Mutex::new(Some(stop_tx));
    token.on_cancel(move || {
        stop_tx.lock().take();
    });

    let weak = Arc::downgrade(token);
    runtime.spawn(async move {
        tokio::select! {
            () = tokio::time::sleep_until(deadline.into()) => fire(&weak),
            _ = stop_rx => {}
        }
    })
}

fn spawn_timer_thread(
    token: &Arc<CancellationToken>,
    deadline: Instant,
) -> std::io::Result<JoinHandle<()>> {
    let signal = Arc::new(TimerSignal::default());
    let weak = Arc::downgrade(token);
    let waiter = Arc::clone(&signal);
    let handle = std::thread::Builder::new()
        .name("closer-timeout".to_string())
        .spawn(move || {
            if waiter.wait_until(deadline) {
                fire(&weak);
            }
        })?;

    let guard = StopOnDrop(signal);
    token.on_cancel(move || guard.0.stop());
    Ok(handle)
}

/// Wakes a timer thread before its deadline.
#[derive(Default)]
struct TimerSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl TimerSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    /// Blocks until `deadline` or [`TimerSignal::stop`]. Returns true when
    /// the deadline was reached without a stop.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                return !*stopped;
            }
        }
        false
    }
}

/// Stops the timer when the owning callback is dropped, which also happens
/// when the token itself is dropped.
struct StopOnDrop(Arc<TimerSignal>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.stop();
    }
}

fn fire(token: &Weak<CancellationToken>) {
    if let Some(token) = token.upgrade() {
        if !token.is_cancelled() {
            token.cancel(DEADLINE_EXCEEDED);
        }
        debug!(reason = ?token.reason(), "Timeout fired");
    }
}
