//! Error taxonomy for booking operations.
//!
//! Business-rule rejections are decided inside the transaction on
//! freshly-read data and surfaced verbatim; they are never retried. Store
//! conflicts are retried below the API boundary and only leak as
//! [`BookingError::TransientFailure`] once retries are exhausted.

use crate::store::StoreError;
use crate::types::{ReservationId, SessionId, UserId};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by `reserve` and `cancel`.
#[derive(Error, Debug)]
pub enum BookingError {
    /// The session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The reservation does not exist.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// The reservation was already cancelled.
    ///
    /// Benign: nothing to do, and nothing was mutated. Retrying will not
    /// change the answer.
    #[error("reservation {0} is already cancelled")]
    AlreadyCancelled(ReservationId),

    /// The user already holds an active reservation for this session.
    #[error("user {user} already holds an active reservation for session {session}")]
    DuplicateReservation {
        /// The requesting user.
        user: UserId,
        /// The session in question.
        session: SessionId,
    },

    /// The user already holds an active reservation for another session on
    /// the same calendar date.
    #[error("user {user} already has a reservation on {date}")]
    DailyLimitExceeded {
        /// The requesting user.
        user: UserId,
        /// The contested date.
        date: NaiveDate,
    },

    /// The user's visit quota is exhausted or expired.
    #[error("visit quota exhausted or expired for user {user}")]
    QuotaExhausted {
        /// The requesting user.
        user: UserId,
    },

    /// The session has already started; no reservations or joins accepted.
    #[error("session {0} has already started")]
    SessionClosed(SessionId),

    /// Conflict retries were exhausted; the caller may retry the whole
    /// operation.
    #[error("operation aborted after {attempts} conflicting attempts")]
    TransientFailure {
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// The storage backend failed outside of conflict detection.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Whether the caller may usefully retry the operation as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }

    /// Whether this is a "nothing to do" answer rather than a failure.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::AlreadyCancelled(_))
    }
}
