//! # Slotbook Store
//!
//! In-memory implementation of [`TransactionalStore`] with snapshot
//! isolation and automatic write-conflict detection.
//!
//! Every record carries a revision. `begin` clones a consistent snapshot
//! under the store lock; `commit` re-acquires the lock, validates that every
//! revision in the transaction's read-set still matches, then applies the
//! write-set and bumps revisions. Reservation writes also bump the
//! per-session and per-user index revisions, so scans ("the waitlist for
//! session S", "all reservations of user U") conflict correctly with
//! concurrent inserts and updates.
//!
//! The validate-then-apply step is a single critical section, which makes
//! commits serializable: of two transactions racing on overlapping state,
//! exactly one commits and the other observes [`StoreError::Conflict`].

use slotbook_core::store::{
    ReadKey, StoreError, StoreSnapshot, Transaction, TransactionalStore, WriteOp,
};
use slotbook_core::types::{Reservation, ReservationId, Session, SessionId, UserId, UserQuota};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, (u64, Session)>,
    reservations: HashMap<ReservationId, (u64, Reservation)>,
    quotas: HashMap<UserId, (u64, UserQuota)>,
    session_index: HashMap<SessionId, u64>,
    user_index: HashMap<UserId, u64>,
}

impl Inner {
    fn current_rev(&self, key: ReadKey) -> u64 {
        match key {
            ReadKey::Session(id) => self.sessions.get(&id).map_or(0, |(rev, _)| *rev),
            ReadKey::Reservation(id) => self.reservations.get(&id).map_or(0, |(rev, _)| *rev),
            ReadKey::Quota(id) => self.quotas.get(&id).map_or(0, |(rev, _)| *rev),
            ReadKey::SessionReservations(id) => self.session_index.get(&id).copied().unwrap_or(0),
            ReadKey::UserReservations(id) => self.user_index.get(&id).copied().unwrap_or(0),
        }
    }

    fn validate(&self, reads: &[(ReadKey, u64)]) -> Result<(), StoreError> {
        for &(key, read) in reads {
            let current = self.current_rev(key);
            if current != read {
                return Err(StoreError::Conflict { key, read, current });
            }
        }
        Ok(())
    }

    fn apply(&mut self, writes: Vec<WriteOp>) {
        for op in writes {
            match op {
                WriteOp::PutSession(session) => {
                    let rev = self
                        .sessions
                        .get(&session.id)
                        .map_or(1, |(rev, _)| rev + 1);
                    self.sessions.insert(session.id, (rev, session));
                }
                WriteOp::PutReservation(reservation) => {
                    let rev = self
                        .reservations
                        .get(&reservation.id)
                        .map_or(1, |(rev, _)| rev + 1);
                    *self
                        .session_index
                        .entry(reservation.session_id)
                        .or_insert(0) += 1;
                    *self.user_index.entry(reservation.user_id).or_insert(0) += 1;
                    self.reservations
                        .insert(reservation.id, (rev, reservation));
                }
                WriteOp::PutQuota(quota) => {
                    let rev = self.quotas.get(&quota.user_id).map_or(1, |(rev, _)| rev + 1);
                    self.quotas.insert(quota.user_id, (rev, quota));
                }
            }
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::from_parts(
            self.sessions.clone(),
            self.reservations.clone(),
            self.quotas.clone(),
            self.session_index.clone(),
            self.user_index.clone(),
        )
    }
}

/// In-memory transactional store.
///
/// Cheap to clone snapshots of (booking datasets are small) and fully
/// deterministic, which makes it the reference backend for tests and the
/// default for single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

impl TransactionalStore for MemoryStore {
    fn begin(&self) -> Pin<Box<dyn Future<Output = Result<Transaction, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(Transaction::new(inner.snapshot()))
        })
    }

    fn commit(
        &self,
        tx: Transaction,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let (reads, writes) = tx.into_parts();
            let mut inner = self.lock()?;
            if let Err(conflict) = inner.validate(&reads) {
                tracing::debug!(%conflict, "transaction aborted");
                return Err(conflict);
            }
            inner.apply(writes);
            Ok(())
        })
    }
}
