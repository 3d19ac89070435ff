//! Teardown guard for cleanup that must run on every exit path.

/// Runs a closure when dropped: on normal return, early return, panic, or
/// when the enclosing future is dropped mid-poll.
pub(crate) struct TeardownGuard<F: FnOnce()> {
    teardown: Option<F>,
}

impl<F: FnOnce()> TeardownGuard<F> {
    pub(crate) fn new(teardown: F) -> Self {
        Self {
            teardown: Some(teardown),
        }
    }
}

impl<F: FnOnce()> Drop for TeardownGuard<F> {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}
