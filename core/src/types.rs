//! Domain types for the Slotbook booking engine.
//!
//! Value objects and entities for sessions, reservations, and visit quotas.
//! Reservations carry their full lifecycle (including cancellation) as data;
//! records are never deleted, so cancellation stays idempotent and the audit
//! trail survives.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a bookable session
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random `SessionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SessionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable internal identifier for a user.
///
/// Phone numbers and other notification addresses are delivery attributes,
/// never join keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation.
///
/// Ordered so it can serve as a deterministic tie-breaker in the waitlist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Session
// ============================================================================

/// A fixed-capacity, fixed-time bookable slot.
///
/// `occupied` is a denormalized cache of the number of Reserved reservations
/// referencing this session. Every completed transaction keeps it in sync;
/// the audit routine in the engine reports any drift.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Calendar date of the session
    pub date: NaiveDate,
    /// Start of the time range
    pub start_time: NaiveTime,
    /// End of the time range
    pub end_time: NaiveTime,
    /// Maximum number of Reserved reservations (at least 1)
    pub capacity: u32,
    /// Cached count of Reserved reservations
    pub occupied: u32,
}

impl Session {
    /// Creates an empty session at the given date and time range.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        capacity: u32,
    ) -> Self {
        Self {
            id: SessionId::new(),
            date,
            start_time,
            end_time,
            capacity,
            occupied: 0,
        }
    }

    /// The instant the session starts.
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.start_time).and_utc()
    }

    /// Whether the session has already started at `now`.
    #[must_use]
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at() <= now
    }

    /// Increment the occupied counter (a slot was taken).
    pub const fn take_slot(&mut self) {
        self.occupied += 1;
    }

    /// Decrement the occupied counter, floored at zero.
    pub const fn release_slot(&mut self) {
        self.occupied = self.occupied.saturating_sub(1);
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// Lifecycle state of a reservation.
///
/// Legal transitions: `Waitlisted → Reserved` (promotion) and
/// `{Reserved, Waitlisted} → Cancelled`. `Cancelled` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Holds a slot against the session's capacity
    Reserved,
    /// Queued for promotion; occupies no slot
    Waitlisted,
    /// Terminal; occupies no slot and never changes again
    Cancelled,
}

impl ReservationStatus {
    /// Whether this status counts as active (holds or waits for a slot).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Reserved | Self::Waitlisted)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserved => write!(f, "reserved"),
            Self::Waitlisted => write!(f, "waitlisted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A user's claim on a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// The session this reservation is for
    pub session_id: SessionId,
    /// The owning user
    pub user_id: UserId,
    /// Lifecycle state
    pub status: ReservationStatus,
    /// Monotonic ordering key for the waitlist
    pub created_at: DateTime<Utc>,
    /// Whether a quota unit was deducted when this reservation was created
    pub quota_deducted: bool,
    /// Whether the quota unit was credited back (set at most once)
    pub refunded: bool,
    /// When the reservation was cancelled, if ever
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When the refund was applied, if ever
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Creates a new active reservation.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        status: ReservationStatus,
        created_at: DateTime<Utc>,
        quota_deducted: bool,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            session_id,
            user_id,
            status,
            created_at,
            quota_deducted,
            refunded: false,
            cancelled_at: None,
            refunded_at: None,
        }
    }

    /// Whether the reservation is Reserved or Waitlisted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Transition `Waitlisted → Reserved`. Other states are untouched.
    pub const fn promote(&mut self) {
        if matches!(self.status, ReservationStatus::Waitlisted) {
            self.status = ReservationStatus::Reserved;
        }
    }

    /// Transition into the terminal `Cancelled` state, recording the refund
    /// decision. No-op when already cancelled.
    pub const fn cancel(&mut self, at: DateTime<Utc>, refunded: bool) {
        if self.status.is_active() {
            self.status = ReservationStatus::Cancelled;
            self.cancelled_at = Some(at);
            self.refunded = refunded;
            if refunded {
                self.refunded_at = Some(at);
            }
        }
    }
}

// ============================================================================
// UserQuota
// ============================================================================

/// Per-user remaining-visit balance and validity window.
///
/// The balance changes only through paired deduct/credit operations; the
/// at-most-once guard lives in the reservation's `quota_deducted` /
/// `refunded` flags, not here. The account has no memory of *why* it changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuota {
    /// The owning user
    pub user_id: UserId,
    /// Remaining visit allowance; may go below zero down to a configured floor
    pub remaining_visits: i32,
    /// Last date (inclusive) the allowance may be spent
    pub valid_until: Option<NaiveDate>,
}

impl UserQuota {
    /// Creates a quota account with the given balance and no expiry.
    #[must_use]
    pub const fn new(user_id: UserId, remaining_visits: i32) -> Self {
        Self {
            user_id,
            remaining_visits,
            valid_until: None,
        }
    }

    /// Whether a reservation attempt may spend from this account: the
    /// balance must sit strictly above `floor` and the validity window, when
    /// set, must not have passed.
    #[must_use]
    pub fn is_spendable(&self, floor: i32, today: NaiveDate) -> bool {
        if self.remaining_visits <= floor {
            return false;
        }
        match self.valid_until {
            Some(until) => until >= today,
            None => true,
        }
    }

    /// The account after one visit is deducted, clamped at `floor`.
    #[must_use]
    pub fn deducted(&self, floor: i32) -> Self {
        Self {
            remaining_visits: self.remaining_visits.saturating_sub(1).max(floor),
            ..self.clone()
        }
    }

    /// The account after one visit is credited back.
    #[must_use]
    pub fn credited(&self) -> Self {
        Self {
            remaining_visits: self.remaining_visits.saturating_add(1),
            ..self.clone()
        }
    }
}
