//! Transactional store abstraction.
//!
//! The coordinator composes `get`-style reads and `put`-style writes into a
//! single all-or-nothing [`Transaction`] against a [`TransactionalStore`].
//! The contract is optimistic: `begin` hands out a consistent snapshot,
//! every read is recorded with the revision it observed (including index
//! scans, which record a per-session or per-user index revision), and
//! `commit` revalidates the whole read-set before applying the write-set
//! atomically. Any entity or index touched by a concurrent commit aborts
//! the transaction with [`StoreError::Conflict`]; the caller retries the
//! whole operation.
//!
//! No partial state is ever observable: a transaction either fully commits
//! or leaves the store untouched.

use crate::types::{Reservation, ReservationId, Session, SessionId, UserId, UserQuota};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Optimistic concurrency conflict: something in the read-set changed
    /// between `begin` and `commit`.
    ///
    /// This typically means another transaction touched an overlapping
    /// entity or index concurrently. The whole operation should be retried.
    #[error("write conflict on {key}: read revision {read}, current {current}")]
    Conflict {
        /// The read-set entry that failed validation.
        key: ReadKey,
        /// The revision observed at read time.
        read: u64,
        /// The revision found at commit time.
        current: u64,
    },

    /// Storage backend error.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A key in a transaction's read-set.
///
/// Entity keys track a single record's revision; the two index variants
/// track the revision of a scan (any reservation write for the session or
/// user bumps the corresponding index), so predicate reads like "the
/// waitlist for session S" conflict correctly with concurrent inserts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadKey {
    /// A session record.
    Session(SessionId),
    /// A reservation record.
    Reservation(ReservationId),
    /// A quota account record.
    Quota(UserId),
    /// The set of reservations referencing a session.
    SessionReservations(SessionId),
    /// The set of reservations owned by a user.
    UserReservations(UserId),
}

impl fmt::Display for ReadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session/{id}"),
            Self::Reservation(id) => write!(f, "reservation/{id}"),
            Self::Quota(id) => write!(f, "quota/{id}"),
            Self::SessionReservations(id) => write!(f, "reservations-by-session/{id}"),
            Self::UserReservations(id) => write!(f, "reservations-by-user/{id}"),
        }
    }
}

/// A buffered write, applied atomically at commit.
///
/// All writes are upserts; deletion does not exist in this model
/// (cancellation is a status transition).
#[derive(Clone, Debug)]
pub enum WriteOp {
    /// Insert or update a session.
    PutSession(Session),
    /// Insert or update a reservation.
    PutReservation(Reservation),
    /// Insert or update a quota account.
    PutQuota(UserQuota),
}

/// An immutable, consistent view of the store taken at `begin`.
#[derive(Clone, Debug, Default)]
pub struct StoreSnapshot {
    sessions: HashMap<SessionId, (u64, Session)>,
    reservations: HashMap<ReservationId, (u64, Reservation)>,
    quotas: HashMap<UserId, (u64, UserQuota)>,
    session_index: HashMap<SessionId, u64>,
    user_index: HashMap<UserId, u64>,
}

impl StoreSnapshot {
    /// Assembles a snapshot from versioned records and index revisions.
    ///
    /// Revisions start at 1 for existing records; absent records and
    /// untouched indexes read as revision 0.
    #[must_use]
    pub const fn from_parts(
        sessions: HashMap<SessionId, (u64, Session)>,
        reservations: HashMap<ReservationId, (u64, Reservation)>,
        quotas: HashMap<UserId, (u64, UserQuota)>,
        session_index: HashMap<SessionId, u64>,
        user_index: HashMap<UserId, u64>,
    ) -> Self {
        Self {
            sessions,
            reservations,
            quotas,
            session_index,
            user_index,
        }
    }
}

/// A single atomic read-modify-write unit.
///
/// Reads go through the snapshot and record what they saw; writes are
/// buffered until [`TransactionalStore::commit`]. Reads do not observe
/// buffered writes — the coordinator's read-phase finishes before its
/// write-phase starts, so read-your-writes is deliberately unsupported.
#[derive(Debug)]
pub struct Transaction {
    snapshot: StoreSnapshot,
    reads: Vec<(ReadKey, u64)>,
    writes: Vec<WriteOp>,
}

impl Transaction {
    /// Opens a transaction over the given snapshot.
    #[must_use]
    pub const fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn record(&mut self, key: ReadKey, rev: u64) {
        // A transaction may legitimately read the same key twice (the
        // snapshot is stable), keep only the first record.
        if !self.reads.iter().any(|(k, _)| *k == key) {
            self.reads.push((key, rev));
        }
    }

    /// Read a session record.
    pub fn session(&mut self, id: SessionId) -> Option<Session> {
        let entry = self.snapshot.sessions.get(&id).cloned();
        let rev = entry.as_ref().map_or(0, |(rev, _)| *rev);
        self.record(ReadKey::Session(id), rev);
        entry.map(|(_, session)| session)
    }

    /// Read a reservation record.
    pub fn reservation(&mut self, id: ReservationId) -> Option<Reservation> {
        let entry = self.snapshot.reservations.get(&id).cloned();
        let rev = entry.as_ref().map_or(0, |(rev, _)| *rev);
        self.record(ReadKey::Reservation(id), rev);
        entry.map(|(_, reservation)| reservation)
    }

    /// Read a quota account.
    pub fn quota(&mut self, user: UserId) -> Option<UserQuota> {
        let entry = self.snapshot.quotas.get(&user).cloned();
        let rev = entry.as_ref().map_or(0, |(rev, _)| *rev);
        self.record(ReadKey::Quota(user), rev);
        entry.map(|(_, quota)| quota)
    }

    /// Scan all reservations referencing a session, in no particular order.
    pub fn reservations_for_session(&mut self, session: SessionId) -> Vec<Reservation> {
        let rev = self
            .snapshot
            .session_index
            .get(&session)
            .copied()
            .unwrap_or(0);
        self.record(ReadKey::SessionReservations(session), rev);
        self.snapshot
            .reservations
            .values()
            .filter(|(_, r)| r.session_id == session)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Scan all reservations owned by a user, in no particular order.
    pub fn reservations_for_user(&mut self, user: UserId) -> Vec<Reservation> {
        let rev = self.snapshot.user_index.get(&user).copied().unwrap_or(0);
        self.record(ReadKey::UserReservations(user), rev);
        self.snapshot
            .reservations
            .values()
            .filter(|(_, r)| r.user_id == user)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// List every session in the snapshot.
    ///
    /// Diagnostic reads for the audit routine; records nothing in the
    /// read-set because audits never commit.
    #[must_use]
    pub fn all_sessions(&self) -> Vec<Session> {
        self.snapshot
            .sessions
            .values()
            .map(|(_, s)| s.clone())
            .collect()
    }

    /// Stage a session write.
    pub fn put_session(&mut self, session: Session) {
        self.writes.push(WriteOp::PutSession(session));
    }

    /// Stage a reservation write.
    pub fn put_reservation(&mut self, reservation: Reservation) {
        self.writes.push(WriteOp::PutReservation(reservation));
    }

    /// Stage a quota write.
    pub fn put_quota(&mut self, quota: UserQuota) {
        self.writes.push(WriteOp::PutQuota(quota));
    }

    /// Whether the transaction staged any writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consume the transaction into its read-set and write-set for commit.
    #[must_use]
    pub fn into_parts(self) -> (Vec<(ReadKey, u64)>, Vec<WriteOp>) {
        (self.reads, self.writes)
    }
}

/// A transactional document store: `begin` a snapshot-backed transaction,
/// `commit` it all-or-nothing with automatic conflict detection.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be safely shared across tasks.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn TransactionalStore>`).
pub trait TransactionalStore: Send + Sync {
    /// Open a transaction over a consistent snapshot of the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the backend cannot produce a
    /// snapshot.
    fn begin(&self) -> Pin<Box<dyn Future<Output = Result<Transaction, StoreError>> + Send + '_>>;

    /// Validate the transaction's read-set and apply its write-set
    /// atomically.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`]: something read by the transaction changed
    ///   concurrently; retry the whole operation.
    /// - [`StoreError::Backend`]: the backend failed.
    fn commit(
        &self,
        tx: Transaction,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReservationStatus;
    use chrono::{NaiveDate, NaiveTime, Utc};

    #[allow(clippy::unwrap_used)]
    fn sample_session() -> Session {
        Session::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            5,
        )
    }

    fn snapshot_with(session: &Session) -> StoreSnapshot {
        let mut sessions = HashMap::new();
        sessions.insert(session.id, (3, session.clone()));
        StoreSnapshot::from_parts(
            sessions,
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
        )
    }

    #[test]
    fn reads_record_observed_revisions() {
        let session = sample_session();
        let mut tx = Transaction::new(snapshot_with(&session));

        assert!(tx.session(session.id).is_some());
        let missing = SessionId::new();
        assert!(tx.session(missing).is_none());
        let reservations = tx.reservations_for_session(session.id);
        assert!(reservations.is_empty());

        let (reads, writes) = tx.into_parts();
        assert!(writes.is_empty());
        assert_eq!(
            reads,
            vec![
                (ReadKey::Session(session.id), 3),
                (ReadKey::Session(missing), 0),
                (ReadKey::SessionReservations(session.id), 0),
            ]
        );
    }

    #[test]
    fn repeated_reads_record_once() {
        let session = sample_session();
        let mut tx = Transaction::new(snapshot_with(&session));
        tx.session(session.id);
        tx.session(session.id);
        let (reads, _) = tx.into_parts();
        assert_eq!(reads.len(), 1);
    }

    #[test]
    fn writes_are_buffered_not_visible() {
        let session = sample_session();
        let mut tx = Transaction::new(snapshot_with(&session));

        let reservation = Reservation::new(
            session.id,
            UserId::new(),
            ReservationStatus::Reserved,
            Utc::now(),
            true,
        );
        tx.put_reservation(reservation.clone());

        // Buffered writes stay invisible to reads within the transaction.
        assert!(tx.reservation(reservation.id).is_none());
        assert!(!tx.is_read_only());
    }
}
