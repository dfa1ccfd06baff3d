//! Configuration management for the booking engine.
//!
//! Loads configuration from environment variables with sensible defaults.

use slotbook_core::notify::TemplateId;
use slotbook_core::types::UserId;
use std::env;
use std::time::Duration;
use uuid::Uuid;

/// Booking engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Lowest balance a quota account may reach. Reservation requires the
    /// balance to sit strictly above this. Historical deployments used −5.
    pub quota_floor: i32,
    /// Identity exempt from the one-reservation-per-day rule.
    pub privileged_user: Option<UserId>,
    /// Maximum transaction attempts before surfacing `TransientFailure`.
    pub max_attempts: u32,
    /// Backoff added per failed attempt.
    pub retry_backoff: Duration,
    /// Template delivered to a promoted waitlisted user.
    pub promotion_template: TemplateId,
}

impl BookingConfig {
    /// Load a `.env` file when present, then read the environment.
    #[must_use]
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            quota_floor: env::var("SLOTBOOK_QUOTA_FLOOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(-1),
            privileged_user: env::var("SLOTBOOK_PRIVILEGED_USER")
                .ok()
                .and_then(|s| s.parse::<Uuid>().ok())
                .map(UserId::from_uuid),
            max_attempts: env::var("SLOTBOOK_MAX_TX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            retry_backoff: Duration::from_millis(
                env::var("SLOTBOOK_RETRY_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25),
            ),
            promotion_template: TemplateId::new(
                env::var("SLOTBOOK_PROMOTION_TEMPLATE")
                    .unwrap_or_else(|_| "waitlist_moved".to_string()),
            ),
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            quota_floor: -1,
            privileged_user: None,
            max_attempts: 5,
            retry_backoff: Duration::from_millis(25),
            promotion_template: TemplateId::new("waitlist_moved"),
        }
    }
}
