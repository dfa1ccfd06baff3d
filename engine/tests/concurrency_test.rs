//! Optimistic-concurrency behavior under contending transactions.

#![allow(clippy::unwrap_used)]

use futures::future::join_all;
use slotbook_core::environment::Clock;
use slotbook_core::error::BookingError;
use slotbook_core::store::{ReadKey, StoreError, Transaction, TransactionalStore};
use slotbook_core::types::{ReservationStatus, SessionId, UserId};
use slotbook_engine::{BookingConfig, BookingCoordinator};
use slotbook_store::MemoryStore;
use slotbook_testing::fixtures::{future_session, seed_session, seed_user};
use slotbook_testing::{test_clock, RecordingDispatcher};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn contended_engine(store: &Arc<MemoryStore>, max_attempts: u32) -> BookingCoordinator {
    BookingCoordinator::new(
        Arc::clone(store) as Arc<dyn TransactionalStore>,
        Arc::new(RecordingDispatcher::new()),
        Arc::new(test_clock()),
        BookingConfig {
            max_attempts,
            retry_backoff: Duration::from_millis(1),
            ..BookingConfig::default()
        },
    )
}

async fn reserved_count(store: &MemoryStore, session: SessionId) -> usize {
    store
        .begin()
        .await
        .unwrap()
        .reservations_for_session(session)
        .iter()
        .filter(|r| r.status == ReservationStatus::Reserved)
        .count()
}

#[tokio::test]
async fn two_contenders_for_the_last_slot_get_one_seat() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let now = test_clock().now();
    let session = future_session(now, 1);
    seed_session(&store, session.clone()).await.unwrap();
    let alice = seed_user(&store, 3).await.unwrap();
    let bob = seed_user(&store, 3).await.unwrap();

    let booking = contended_engine(&store, 5);
    let (a, b) = tokio::join!(
        booking.reserve(session.id, alice),
        booking.reserve(session.id, bob),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    // Exactly one seat exists; the loser lands on the waitlist, never on a
    // second seat.
    let statuses = [a.status, b.status];
    assert!(statuses.contains(&ReservationStatus::Reserved));
    assert!(statuses.contains(&ReservationStatus::Waitlisted));
    assert_eq!(reserved_count(&store, session.id).await, 1);

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.session(session.id).unwrap().occupied, 1);
}

#[tokio::test]
async fn contenders_fill_exactly_the_capacity() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let now = test_clock().now();
    let session = future_session(now, 3);
    seed_session(&store, session.clone()).await.unwrap();

    let mut users = Vec::new();
    for _ in 0..8 {
        users.push(seed_user(&store, 3).await.unwrap());
    }

    let booking = Arc::new(contended_engine(&store, 16));
    let outcomes = join_all(
        users
            .iter()
            .map(|user| booking.reserve(session.id, *user)),
    )
    .await;

    let mut reserved = 0;
    let mut waitlisted = 0;
    for outcome in outcomes {
        match outcome.unwrap().status {
            ReservationStatus::Reserved => reserved += 1,
            ReservationStatus::Waitlisted => waitlisted += 1,
            ReservationStatus::Cancelled => unreachable!("reserve never yields cancelled"),
        }
    }
    assert_eq!(reserved, 3);
    assert_eq!(waitlisted, 5);

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.session(session.id).unwrap().occupied, 3);
    let report = booking.audit_all().await.unwrap();
    assert!(report.is_clean());
}

#[tokio::test]
async fn concurrent_cancel_and_reserve_stay_consistent() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let now = test_clock().now();
    let session = future_session(now, 1);
    seed_session(&store, session.clone()).await.unwrap();
    let holder = seed_user(&store, 3).await.unwrap();
    let waiting = seed_user(&store, 3).await.unwrap();
    let newcomer = seed_user(&store, 3).await.unwrap();

    let booking = contended_engine(&store, 8);
    let held = booking.reserve(session.id, holder).await.unwrap();
    let queued = booking.reserve(session.id, waiting).await.unwrap();

    // The newcomer books at a later instant, so the queued party stays
    // ahead in line whichever transaction commits first.
    let late_booking = BookingCoordinator::new(
        Arc::clone(&store) as Arc<dyn TransactionalStore>,
        Arc::new(RecordingDispatcher::new()),
        Arc::new(slotbook_testing::FixedClock::new(
            now + chrono::Duration::minutes(1),
        )),
        BookingConfig {
            max_attempts: 8,
            retry_backoff: Duration::from_millis(1),
            ..BookingConfig::default()
        },
    );

    let (cancelled, reserved) = tokio::join!(
        booking.cancel(held.reservation_id),
        late_booking.reserve(session.id, newcomer),
    );
    let cancelled = cancelled.unwrap();
    reserved.unwrap();

    // The queued party was first in line regardless of interleaving.
    assert_eq!(cancelled.promoted_user, Some(waiting));
    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.reservation(queued.reservation_id).unwrap().status,
        ReservationStatus::Reserved
    );
    assert_eq!(reserved_count(&store, session.id).await, 1);
    assert!(booking.audit_all().await.unwrap().is_clean());
}

/// Store whose commits always conflict, to drive the retry loop to
/// exhaustion.
struct AlwaysConflicting {
    inner: MemoryStore,
}

impl TransactionalStore for AlwaysConflicting {
    fn begin(&self) -> Pin<Box<dyn Future<Output = Result<Transaction, StoreError>> + Send + '_>> {
        self.inner.begin()
    }

    fn commit(
        &self,
        _tx: Transaction,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async {
            Err(StoreError::Conflict {
                key: ReadKey::Session(SessionId::new()),
                read: 1,
                current: 2,
            })
        })
    }
}

#[tokio::test]
async fn exhausted_retries_surface_as_transient_failure() {
    init_tracing();
    let inner = MemoryStore::new();
    let now = test_clock().now();
    let session = future_session(now, 5);
    seed_session(&inner, session.clone()).await.unwrap();

    let booking = BookingCoordinator::new(
        Arc::new(AlwaysConflicting { inner }),
        Arc::new(RecordingDispatcher::new()),
        Arc::new(test_clock()),
        BookingConfig {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
            ..BookingConfig::default()
        },
    );

    let err = booking.reserve(session.id, UserId::new()).await.unwrap_err();
    assert!(matches!(err, BookingError::TransientFailure { attempts: 3 }));
    assert!(err.is_retryable());
}
