//! Counter audit over a live store.

#![allow(clippy::unwrap_used)]

use chrono::Duration;
use slotbook_core::environment::Clock;
use slotbook_core::error::BookingError;
use slotbook_core::notify::NotificationDispatcher;
use slotbook_core::store::TransactionalStore;
use slotbook_core::types::SessionId;
use slotbook_engine::{AuditIssue, BookingConfig, BookingCoordinator};
use slotbook_store::MemoryStore;
use slotbook_testing::fixtures::{future_session, seed_session, seed_user, session_on};
use slotbook_testing::{test_clock, RecordingDispatcher};
use std::sync::Arc;

fn engine(store: &Arc<MemoryStore>) -> BookingCoordinator {
    BookingCoordinator::new(
        Arc::clone(store) as Arc<dyn TransactionalStore>,
        Arc::new(RecordingDispatcher::new()) as Arc<dyn NotificationDispatcher>,
        Arc::new(test_clock()),
        BookingConfig::default(),
    )
}

#[tokio::test]
async fn traffic_leaves_a_clean_report() {
    let store = Arc::new(MemoryStore::new());
    let now = test_clock().now();
    let first = future_session(now, 2);
    let second = session_on(first.date + Duration::days(1), 1);
    seed_session(&store, first.clone()).await.unwrap();
    seed_session(&store, second.clone()).await.unwrap();

    let booking = engine(&store);
    let a = seed_user(&store, 5).await.unwrap();
    let b = seed_user(&store, 5).await.unwrap();
    let c = seed_user(&store, 5).await.unwrap();

    let held = booking.reserve(first.id, a).await.unwrap();
    booking.reserve(first.id, b).await.unwrap();
    booking.reserve(second.id, c).await.unwrap();
    booking.cancel(held.reservation_id).await.unwrap();

    let report = booking.audit_all().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.issue_count(), 0);
    assert_eq!(report.sessions.len(), 2);

    // Sessions come back in calendar order.
    assert_eq!(report.sessions[0].session_id, first.id);
    assert_eq!(report.sessions[0].reserved_count, 1);
    assert_eq!(report.sessions[1].session_id, second.id);
    assert_eq!(report.sessions[1].reserved_count, 1);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let booking = engine(&store);
    let missing = SessionId::new();
    let err = booking.audit_session(missing).await.unwrap_err();
    assert!(matches!(err, BookingError::SessionNotFound(id) if id == missing));
}

#[tokio::test]
async fn corrupted_counter_is_reported_as_drift() {
    let store = Arc::new(MemoryStore::new());
    let now = test_clock().now();
    let session = future_session(now, 5);
    seed_session(&store, session.clone()).await.unwrap();

    let booking = engine(&store);
    let user = seed_user(&store, 5).await.unwrap();
    booking.reserve(session.id, user).await.unwrap();

    // Corrupt the cached counter behind the coordinator's back.
    let mut tx = store.begin().await.unwrap();
    let mut corrupted = tx.session(session.id).unwrap();
    corrupted.occupied = 4;
    tx.put_session(corrupted);
    store.commit(tx).await.unwrap();

    let audit = booking.audit_session(session.id).await.unwrap();
    assert!(!audit.is_clean());
    assert_eq!(
        audit.issues,
        vec![AuditIssue::OccupiedDrift {
            recorded: 4,
            actual: 1
        }]
    );
}

#[tokio::test]
async fn report_serializes_for_export() {
    let store = Arc::new(MemoryStore::new());
    let now = test_clock().now();
    let session = future_session(now, 2);
    seed_session(&store, session.clone()).await.unwrap();

    let booking = engine(&store);
    let user = seed_user(&store, 5).await.unwrap();
    booking.reserve(session.id, user).await.unwrap();

    let report = booking.audit_all().await.unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sessions"][0]["reserved_count"], 1);
    assert_eq!(json["sessions"][0]["issues"], serde_json::json!([]));
}
