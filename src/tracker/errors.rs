// src/tracker/errors.rs

//! Per-repository tracking errors collector
//!
//! Passes append error messages as they occur; a single flush at the end
//! of the tracker invocation writes each repository's accumulated
//! messages to the catalog as one newline-joined string. Initializing a
//! repository with no subsequent appends makes the flush emit an empty
//! result, which distinguishes "processed cleanly" from "never
//! processed".

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::catalog::RepositoryManager;

/// Sink for per-repository tracking errors
///
/// Implementations must serialize mutations; `append` is called
/// concurrently from parallel repository passes.
pub trait ErrorsCollector: Send + Sync {
    /// Create (or empty) the error list for the repository provided
    fn init(&self, repository_id: &str);

    /// Record an error message, implicitly initializing the repository
    fn append(&self, repository_id: &str, message: &str);

    /// Write the accumulated results to the catalog and reset
    fn flush(&self);
}

/// Errors collector backed by the catalog's last-tracking-results slot
pub struct TrackingErrorsCollector {
    repository_manager: Arc<dyn RepositoryManager>,
    errors: Mutex<HashMap<String, Vec<String>>>,
}

impl TrackingErrorsCollector {
    pub fn new(repository_manager: Arc<dyn RepositoryManager>) -> Self {
        Self {
            repository_manager,
            errors: Mutex::new(HashMap::new()),
        }
    }
}

impl ErrorsCollector for TrackingErrorsCollector {
    fn init(&self, repository_id: &str) {
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.insert(repository_id.to_string(), Vec::new());
    }

    fn append(&self, repository_id: &str, message: &str) {
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors
            .entry(repository_id.to_string())
            .or_default()
            .push(message.to_string());
    }

    fn flush(&self) {
        let drained: HashMap<String, Vec<String>> = {
            let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *errors)
        };
        for (repository_id, messages) in drained {
            let joined = messages.join("\n");
            if let Err(e) = self
                .repository_manager
                .set_last_tracking_results(&repository_id, &joined)
            {
                error!("Error flushing tracking results for repository {}: {}", repository_id, e);
            }
        }
    }
}

/// Collector that discards everything, for testing adapters in isolation
#[derive(Debug, Default)]
pub struct NoopErrorsCollector;

impl ErrorsCollector for NoopErrorsCollector {
    fn init(&self, _repository_id: &str) {}
    fn append(&self, _repository_id: &str, _message: &str) {}
    fn flush(&self) {}
}
