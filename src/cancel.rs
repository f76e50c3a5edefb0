// src/cancel.rs

//! Cooperative cancellation token
//!
//! A single token is threaded through the tracker services and polled at
//! the top of every loop iteration in the engine and the source adapters,
//! so a cancelled run stops issuing catalog mutations at the next
//! iteration boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Clonable cancellation flag shared by all tasks of one tracker run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation to every holder of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return `Error::Cancelled` if cancellation has been requested
    ///
    /// Intended for loop headers: `token.check()?;`
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
