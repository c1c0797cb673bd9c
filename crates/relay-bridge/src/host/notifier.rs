use std::time::Duration;

use tracing::{error, info, warn};

use super::{Notifier, Severity};

/// Surfaces notices through the process log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity, duration: Option<Duration>) {
        let duration_ms = duration.map(|d| d.as_millis() as u64);
        match severity {
            Severity::Info => info!(duration_ms, "{message}"),
            Severity::Warning => warn!(duration_ms, "{message}"),
            Severity::Error => error!(duration_ms, "{message}"),
        }
    }
}
