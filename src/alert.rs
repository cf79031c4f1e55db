//! Alerting Interface
//!
//! Fire-and-forget notification seam consumed by the integrity job. A real
//! deployment plugs in an external transport (mail, chat, pager); failure of
//! the alert itself never alters the integrity check's own result.

use std::sync::Mutex;
use tracing::{error, warn};

/// Fire-and-forget notifier. Implementations must not panic and must not
/// propagate transport failures to the caller.
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, recipient: &str, subject: &str, body: &str);
}

/// Default notifier: escalation lands in the structured log stream, where
/// the surrounding infrastructure picks it up.
pub struct LogAlertNotifier;

impl AlertNotifier for LogAlertNotifier {
    fn notify(&self, recipient: &str, subject: &str, body: &str) {
        error!(recipient, subject, "LEDGER ALERT: {}", body);
    }
}

/// Test double that records every notification.
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_else(|e| {
            warn!("Notifier mutex poisoned: {}", e);
            0
        })
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertNotifier for RecordingNotifier {
    fn notify(&self, recipient: &str, subject: &str, body: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient.to_string(), subject.to_string(), body.to_string()));
        }
    }
}
