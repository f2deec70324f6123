//! Cooperative cancellation shared between the CLI, the runner and
//! in-flight subprocesses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{HarnessError, Result};

/// A flag that aborts a run once set.
///
/// Clones share the same flag. A token made with [`CancelToken::child`]
/// is cancelled when either it or its parent is.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that also observes this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::SeqCst))
    }

    /// Return [`HarnessError::RunAborted`] if cancelled.
    ///
    /// # Errors
    ///
    /// Fails once the token (or its parent) has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(HarnessError::RunAborted)
        } else {
            Ok(())
        }
    }
}
