//! Pure decision functions for `reserve` and `cancel`.
//!
//! The coordinator gathers a context from freshly-read transaction state,
//! calls one of these functions, and stages exactly the writes the returned
//! plan names. Keeping the rules here — with no I/O and no clocks of their
//! own — makes every precondition and edge case unit-testable in isolation.
//!
//! Precondition order for `reserve`: session closed → duplicate → daily
//! limit → quota. All checks run against data read inside the transaction,
//! never against caller-cached state, so concurrent transactions cannot
//! slip a stale decision through commit.

use crate::error::BookingError;
use crate::types::{
    Reservation, ReservationId, ReservationStatus, Session, SessionId, UserId, UserQuota,
};
use crate::waitlist;
use chrono::{DateTime, NaiveDate, Utc};

/// Policy knobs for `reserve`.
#[derive(Clone, Debug)]
pub struct ReservePolicy {
    /// Lowest balance a quota account may reach; reservation requires the
    /// balance to sit strictly above this.
    pub quota_floor: i32,
    /// Identity exempt from the one-reservation-per-day rule.
    pub privileged_user: Option<UserId>,
}

/// Everything `decide_reserve` needs, read inside the transaction.
#[derive(Clone, Copy, Debug)]
pub struct ReserveContext<'a> {
    /// The target session, if it exists.
    pub session: Option<&'a Session>,
    /// All reservations referencing the target session.
    pub session_reservations: &'a [Reservation],
    /// For each active reservation the user holds anywhere: the session it
    /// points at and that session's calendar date.
    pub user_active_dates: &'a [(SessionId, NaiveDate)],
    /// The user's quota account, if one exists.
    pub quota: Option<&'a UserQuota>,
}

/// The writes a successful `reserve` must stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservePlan {
    /// Outcome status: Reserved when capacity remains, Waitlisted otherwise.
    pub status: ReservationStatus,
    /// Whether one quota unit is deducted (false only when the user has no
    /// quota account at all).
    pub deduct_quota: bool,
}

/// Decide the outcome of `reserve(session_id, user)`.
///
/// The Reserved/Waitlisted split counts the authoritative set of Reserved
/// reservations, not the session's cached `occupied` counter.
///
/// # Errors
///
/// - [`BookingError::SessionNotFound`] — unknown session.
/// - [`BookingError::SessionClosed`] — session already started.
/// - [`BookingError::DuplicateReservation`] — user already active on this
///   session.
/// - [`BookingError::DailyLimitExceeded`] — user already active on another
///   session that date (unless privileged).
/// - [`BookingError::QuotaExhausted`] — balance at/below the floor, or the
///   validity window has passed.
pub fn decide_reserve(
    session_id: SessionId,
    user: UserId,
    now: DateTime<Utc>,
    ctx: &ReserveContext<'_>,
    policy: &ReservePolicy,
) -> Result<ReservePlan, BookingError> {
    let session = ctx
        .session
        .ok_or(BookingError::SessionNotFound(session_id))?;

    if session.has_started(now) {
        return Err(BookingError::SessionClosed(session_id));
    }

    if ctx
        .session_reservations
        .iter()
        .any(|r| r.user_id == user && r.is_active())
    {
        return Err(BookingError::DuplicateReservation {
            user,
            session: session_id,
        });
    }

    let privileged = policy.privileged_user == Some(user);
    if !privileged
        && ctx
            .user_active_dates
            .iter()
            .any(|(other, date)| *other != session_id && *date == session.date)
    {
        return Err(BookingError::DailyLimitExceeded {
            user,
            date: session.date,
        });
    }

    let deduct_quota = match ctx.quota {
        Some(quota) => {
            if !quota.is_spendable(policy.quota_floor, now.date_naive()) {
                return Err(BookingError::QuotaExhausted { user });
            }
            true
        }
        // No account to charge; the reservation proceeds unpaid and a later
        // cancellation refunds nothing.
        None => false,
    };

    let reserved = ctx
        .session_reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Reserved)
        .count();
    let reserved = u32::try_from(reserved).unwrap_or(u32::MAX);

    let status = if reserved < session.capacity {
        ReservationStatus::Reserved
    } else {
        ReservationStatus::Waitlisted
    };

    Ok(ReservePlan {
        status,
        deduct_quota,
    })
}

/// Everything `decide_cancel` needs, read inside the transaction.
#[derive(Clone, Copy, Debug)]
pub struct CancelContext<'a> {
    /// The reservation being cancelled, if it exists.
    pub reservation: Option<&'a Reservation>,
    /// The session it references; may be gone for orphaned records, in
    /// which case slot release and promotion are skipped.
    pub session: Option<&'a Session>,
    /// All reservations referencing that session.
    pub session_reservations: &'a [Reservation],
    /// The owner's quota account, if one exists.
    pub quota: Option<&'a UserQuota>,
}

/// The writes a successful `cancel` must stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelPlan {
    /// Whether the cancelled reservation held a slot.
    pub was_reserved: bool,
    /// Whether the quota unit is returned — driven purely by whether one
    /// was deducted at creation, never by how much notice was given.
    pub refunded: bool,
    /// Whether a quota account exists to credit (`refunded` alone is not
    /// enough; the account may be gone).
    pub credit_quota: bool,
    /// The waitlisted reservation to promote, with its owner for the
    /// post-commit notification.
    pub promote: Option<(ReservationId, UserId)>,
}

/// Decide the outcome of `cancel(reservation_id)`.
///
/// Only cancelling a Reserved reservation frees a slot and therefore
/// promotes; a Waitlisted reservation occupied nothing.
///
/// # Errors
///
/// - [`BookingError::ReservationNotFound`] — unknown reservation.
/// - [`BookingError::AlreadyCancelled`] — benign; the caller mutated
///   nothing and must not retry.
pub fn decide_cancel(
    reservation_id: ReservationId,
    ctx: &CancelContext<'_>,
) -> Result<CancelPlan, BookingError> {
    let reservation = ctx
        .reservation
        .ok_or(BookingError::ReservationNotFound(reservation_id))?;

    if reservation.status == ReservationStatus::Cancelled {
        return Err(BookingError::AlreadyCancelled(reservation_id));
    }

    let was_reserved = reservation.status == ReservationStatus::Reserved;
    let refunded = reservation.quota_deducted;

    let promote = if was_reserved && ctx.session.is_some() {
        waitlist::next_in_line_excluding(ctx.session_reservations, reservation_id)
            .map(|next| (next.id, next.user_id))
    } else {
        None
    };

    Ok(CancelPlan {
        was_reserved,
        refunded,
        credit_quota: refunded && ctx.quota.is_some(),
        promote,
    })
}
