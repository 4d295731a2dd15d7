//! [`Notifier`] – fire-and-forget channel for driver-facing status messages.

use std::sync::{Arc, Mutex};

use drivesafe_types::{Notice, Severity};
use tracing::{error, info, warn};

/// Surfaces a [`Notice`] to the driver.  No delivery guarantee.
pub trait Notifier: Send {
    fn notify(&self, notice: Notice);
}

/// Writes every notice to the `tracing` log at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info => info!(title = %notice.title, "{}", notice.description),
            Severity::Warning => warn!(title = %notice.title, "{}", notice.description),
            Severity::Critical => error!(title = %notice.title, "{}", notice.description),
        }
    }
}

/// Keeps every notice in memory.  Clones share the same buffer, so a test can
/// hand one clone to the controller and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all notices so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Titles only, oldest first.
    pub fn titles(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.title).collect()
    }

    /// The most recent notice, if any.
    pub fn last(&self) -> Option<Notice> {
        self.notices().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice);
    }
}
