//! FIFO waitlist ordering.
//!
//! Pure ordering over Waitlisted reservations: earliest `created_at` first,
//! ties broken by reservation id so promotion is deterministic even when two
//! joins share a timestamp.

use crate::types::{Reservation, ReservationStatus};

/// The Waitlisted reservations among `reservations`, in promotion order.
#[must_use]
pub fn ordered_waitlist(reservations: &[Reservation]) -> Vec<&Reservation> {
    let mut waitlist: Vec<&Reservation> = reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Waitlisted)
        .collect();
    waitlist.sort_by_key(|r| (r.created_at, r.id));
    waitlist
}

/// The single next reservation to promote, if any.
#[must_use]
pub fn next_in_line(reservations: &[Reservation]) -> Option<&Reservation> {
    reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Waitlisted)
        .min_by_key(|r| (r.created_at, r.id))
}

/// Like [`next_in_line`], skipping one reservation id.
///
/// Used during cancellation, where the record being cancelled may itself
/// still appear as Waitlisted in the freshly-read set.
#[must_use]
pub fn next_in_line_excluding(
    reservations: &[Reservation],
    excluded: crate::types::ReservationId,
) -> Option<&Reservation> {
    reservations
        .iter()
        .filter(|r| r.id != excluded && r.status == ReservationStatus::Waitlisted)
        .min_by_key(|r| (r.created_at, r.id))
}
