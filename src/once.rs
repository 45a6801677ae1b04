//! Exactly-once deferred execution.

use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Holds a deferred action that runs at most once.
///
/// The first caller of [`Once::ensure_done`] takes the action and runs it;
/// concurrent callers block until it finishes and every caller observes the
/// same stored result. If the action panics the guard is left without a result
/// and later calls panic as well.
pub struct Once<T, F = Box<dyn FnOnce() -> T + Send>> {
    action: Mutex<Option<F>>,
    result: OnceLock<T>,
}

impl<T, F> Once<T, F>
where
    F: FnOnce() -> T,
{
    pub fn new(action: F) -> Self {
        Self {
            action: Mutex::new(Some(action)),
            result: OnceLock::new(),
        }
    }

    pub fn ensure_done(&self) -> &T {
        self.result.get_or_init(|| {
            let action = self
                .action
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            match action {
                Some(action) => action(),
                None => unreachable!("once action taken without storing a result"),
            }
        })
    }

    pub fn is_done(&self) -> bool {
        self.result.get().is_some()
    }

    /// Returns the stored result, or `None` while the action is still pending.
    pub fn get(&self) -> Option<&T> {
        self.result.get()
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Once<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Once").field("result", &self.result.get()).finish()
    }
}
