//! # Slotbook Testing
//!
//! Test doubles and fixtures for the Slotbook booking engine:
//!
//! - Mock implementations of environment traits (`FixedClock`,
//!   `RecordingDispatcher`, `FailingDispatcher`)
//! - Store seeding helpers for integration tests

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use slotbook_core::environment::Clock;
use slotbook_core::notify::{NotificationDispatcher, NotifyError, TemplateId};
use slotbook_core::store::{StoreError, TransactionalStore};
use slotbook_core::types::{Session, UserId, UserQuota};
use slotbook_store::MemoryStore;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// Mock implementations for testing.
pub mod mocks {
    use super::{
        Clock, DateTime, Future, Mutex, NotificationDispatcher, NotifyError, Pin, TemplateId,
        UserId, Utc,
    };

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Dispatcher that captures every notification instead of delivering it.
    #[derive(Debug, Default)]
    pub struct RecordingDispatcher {
        sent: Mutex<Vec<(UserId, TemplateId)>>,
    }

    impl RecordingDispatcher {
        /// Creates an empty recorder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// All notifications dispatched so far, in order.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex was poisoned by a panicking test.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn sent(&self) -> Vec<(UserId, TemplateId)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl NotificationDispatcher for RecordingDispatcher {
        fn dispatch(
            &self,
            recipient: UserId,
            template: &TemplateId,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
            let template = template.clone();
            Box::pin(async move {
                #[allow(clippy::unwrap_used)]
                self.sent.lock().unwrap().push((recipient, template));
                Ok(())
            })
        }
    }

    /// Dispatcher whose channel always fails.
    ///
    /// Used to verify the fire-and-forget contract: a committed cancellation
    /// must survive delivery failure.
    #[derive(Debug, Default)]
    pub struct FailingDispatcher;

    impl NotificationDispatcher for FailingDispatcher {
        fn dispatch(
            &self,
            _recipient: UserId,
            _template: &TemplateId,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
            Box::pin(async { Err(NotifyError::Channel("channel down".to_string())) })
        }
    }
}

/// Store seeding helpers and entity fixtures.
pub mod fixtures {
    use super::{
        Duration, MemoryStore, NaiveDate, NaiveTime, Session, StoreError, TransactionalStore,
        UserId, UserQuota, Utc,
    };
    use chrono::DateTime;

    /// A one-hour session starting tomorrow at 18:00 relative to `now`.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded wall-clock times fail to construct, which
    /// should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn future_session(now: DateTime<Utc>, capacity: u32) -> Session {
        let date = (now + Duration::days(1)).date_naive();
        Session::new(
            date,
            NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
            NaiveTime::from_hms_opt(19, 0, 0).expect("valid time"),
            capacity,
        )
    }

    /// A one-hour session that started yesterday relative to `now`.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded wall-clock times fail to construct, which
    /// should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn past_session(now: DateTime<Utc>, capacity: u32) -> Session {
        let date = (now - Duration::days(1)).date_naive();
        Session::new(
            date,
            NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
            NaiveTime::from_hms_opt(19, 0, 0).expect("valid time"),
            capacity,
        )
    }

    /// A session on a specific date at 18:00.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded wall-clock times fail to construct, which
    /// should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn session_on(date: NaiveDate, capacity: u32) -> Session {
        Session::new(
            date,
            NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
            NaiveTime::from_hms_opt(19, 0, 0).expect("valid time"),
            capacity,
        )
    }

    /// Seed a session into the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the commit fails.
    pub async fn seed_session(store: &MemoryStore, session: Session) -> Result<(), StoreError> {
        let mut tx = store.begin().await?;
        tx.put_session(session);
        store.commit(tx).await
    }

    /// Seed a quota account into the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the commit fails.
    pub async fn seed_quota(store: &MemoryStore, quota: UserQuota) -> Result<(), StoreError> {
        let mut tx = store.begin().await?;
        tx.put_quota(quota);
        store.commit(tx).await
    }

    /// Seed a quota account with the given balance for a fresh user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the commit fails.
    pub async fn seed_user(store: &MemoryStore, visits: i32) -> Result<UserId, StoreError> {
        let user = UserId::new();
        seed_quota(store, UserQuota::new(user, visits)).await?;
        Ok(user)
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FailingDispatcher, FixedClock, RecordingDispatcher};
