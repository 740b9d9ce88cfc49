//! Cancellation and deadline context for resolution and lifecycle calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Error;

/// Timeout handed to exporter shutdowns when the scope carries no deadline.
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Carries a cancellation flag and an optional deadline.
///
/// Clones share the cancellation flag, so canceling any clone cancels every
/// operation running under the same scope.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    canceled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Scope {
    /// A scope that is never canceled and has no deadline until
    /// [`cancel`](Scope::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A scope with a fixed deadline.
    pub fn with_deadline(deadline: Instant) -> Self {
        Scope {
            canceled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Cancels this scope and all its clones.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Scope::cancel) was called.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails with [`Error::Canceled`] or [`Error::DeadlineExceeded`] when the
    /// scope is no longer live.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_canceled() {
            return Err(Error::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    pub(crate) fn shutdown_timeout(&self) -> Duration {
        self.remaining().unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_scope() {
        let scope = Scope::new();
        assert!(scope.check().is_ok());
        assert_eq!(scope.remaining(), None);
        assert_eq!(scope.shutdown_timeout(), DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn cancel_is_shared_by_clones() {
        let scope = Scope::with_timeout(Duration::from_secs(60));
        let child = scope.clone();
        scope.cancel();
        assert!(matches!(child.check(), Err(Error::Canceled)));
    }

    #[test]
    fn expired_deadline() {
        let scope = Scope::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(scope.check(), Err(Error::DeadlineExceeded)));
        assert_eq!(scope.remaining(), Some(Duration::ZERO));
    }
}
