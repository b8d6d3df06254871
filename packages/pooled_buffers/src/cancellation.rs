use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shareable cancellation flag for the async-shaped stream operations.
///
/// Clones share the same flag. Once cancelled, a token stays cancelled.
///
/// # Examples
///
/// ```
/// use pooled_buffers::Cancellation;
///
/// let token = Cancellation::new();
/// let observer = token.clone();
///
/// assert!(token.cancel());
/// assert!(observer.is_cancelled());
///
/// // Only the first call reports the transition.
/// assert!(!token.cancel());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the token has been cancelled.
    #[must_use]
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Cancels the token. Returns `true` if this call did the cancelling.
    pub fn cancel(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Cancellation: Send, Sync, Clone);

    #[test]
    fn starts_uncancelled() {
        assert!(!Cancellation::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_across_threads() {
        let token = Cancellation::new();

        thread::scope(|scope| {
            let remote = token.clone();
            scope.spawn(move || assert!(remote.cancel()));
        });

        assert!(token.is_cancelled());
        assert!(!token.cancel());
    }
}
