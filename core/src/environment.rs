//! Environment traits injected into the coordinator.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability.
///
/// The session-closed check and every audit timestamp go through this seam
/// so tests can pin time with a fixed clock.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
