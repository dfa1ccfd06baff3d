//! Consistency audit over the denormalized occupied counters.
//!
//! `occupied` on a session is a cache of the Reserved count, maintained
//! inside the same transactions that create, cancel, and promote
//! reservations. The audit recomputes the authoritative count from the
//! reservation records and reports any drift. It is diagnostic only: it
//! never writes, and it is never part of the reserve/cancel hot path.

use crate::coordinator::BookingCoordinator;
use serde::{Deserialize, Serialize};
use slotbook_core::error::BookingError;
use slotbook_core::types::{Reservation, ReservationStatus, Session, SessionId};

/// A single inconsistency found by the audit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditIssue {
    /// `occupied` disagrees with the number of Reserved records.
    OccupiedDrift {
        /// The counter stored on the session.
        recorded: u32,
        /// The count recomputed from the reservation records.
        actual: u32,
    },
    /// `occupied` exceeds the session's capacity.
    OccupiedExceedsCapacity {
        /// The counter stored on the session.
        occupied: u32,
        /// The session's capacity.
        capacity: u32,
    },
    /// Parties are waiting while Reserved seats remain free.
    WaitlistWithFreeCapacity {
        /// Number of waitlisted records.
        waiting: u32,
        /// Number of unclaimed seats.
        free: u32,
    },
    /// The session was stored with no capacity at all; nothing can ever be
    /// reserved on it.
    ZeroCapacity,
}

/// The audit result for one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAudit {
    /// The audited session.
    pub session_id: SessionId,
    /// The `occupied` counter as stored.
    pub occupied: u32,
    /// Reserved records counted from the ledger.
    pub reserved_count: u32,
    /// Waitlisted records counted from the ledger.
    pub waitlisted_count: u32,
    /// Inconsistencies found, empty when the session is clean.
    pub issues: Vec<AuditIssue>,
}

impl SessionAudit {
    /// Recomputes the counts for `session` from its reservation records.
    #[must_use]
    pub fn compute(session: &Session, reservations: &[Reservation]) -> Self {
        let count = |status: ReservationStatus| {
            let n = reservations.iter().filter(|r| r.status == status).count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        let reserved_count = count(ReservationStatus::Reserved);
        let waitlisted_count = count(ReservationStatus::Waitlisted);

        let mut issues = Vec::new();
        if session.capacity == 0 {
            issues.push(AuditIssue::ZeroCapacity);
        }
        if session.occupied != reserved_count {
            issues.push(AuditIssue::OccupiedDrift {
                recorded: session.occupied,
                actual: reserved_count,
            });
        }
        if session.occupied > session.capacity {
            issues.push(AuditIssue::OccupiedExceedsCapacity {
                occupied: session.occupied,
                capacity: session.capacity,
            });
        }
        if waitlisted_count > 0 && reserved_count < session.capacity {
            issues.push(AuditIssue::WaitlistWithFreeCapacity {
                waiting: waitlisted_count,
                free: session.capacity - reserved_count,
            });
        }

        Self {
            session_id: session.id,
            occupied: session.occupied,
            reserved_count,
            waitlisted_count,
            issues,
        }
    }

    /// True when no inconsistency was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// The audit result across a set of sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Per-session results, one entry per audited session.
    pub sessions: Vec<SessionAudit>,
}

impl AuditReport {
    /// True when every audited session is clean.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.sessions.iter().all(SessionAudit::is_clean)
    }

    /// Total number of issues across all sessions.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.sessions.iter().map(|s| s.issues.len()).sum()
    }
}

impl BookingCoordinator {
    /// Audits one session against its reservation records.
    ///
    /// # Errors
    ///
    /// [`BookingError::SessionNotFound`] for unknown ids, or a store
    /// failure while reading.
    pub async fn audit_session(
        &self,
        session_id: SessionId,
    ) -> Result<SessionAudit, BookingError> {
        let mut tx = self.store.begin().await?;
        let session = tx
            .session(session_id)
            .ok_or(BookingError::SessionNotFound(session_id))?;
        let reservations = tx.reservations_for_session(session_id);
        Ok(SessionAudit::compute(&session, &reservations))
    }

    /// Audits every session in the store.
    ///
    /// All counts come from one snapshot, so a report over a quiescent
    /// store is exact; under concurrent traffic it is a consistent point
    /// in time, not "now".
    ///
    /// # Errors
    ///
    /// A store failure while reading.
    pub async fn audit_all(&self) -> Result<AuditReport, BookingError> {
        let mut tx = self.store.begin().await?;
        let mut sessions = tx.all_sessions();
        sessions.sort_by_key(|s| (s.date, s.start_time, s.id));
        let audits = sessions
            .iter()
            .map(|session| {
                let reservations = tx.reservations_for_session(session.id);
                SessionAudit::compute(session, &reservations)
            })
            .collect();
        Ok(AuditReport { sessions: audits })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use slotbook_core::types::UserId;

    fn session(capacity: u32, occupied: u32) -> Session {
        Session {
            id: SessionId::new(),
            date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            capacity,
            occupied,
        }
    }

    fn reservation(session_id: SessionId, status: ReservationStatus) -> Reservation {
        Reservation::new(
            session_id,
            UserId::new(),
            status,
            chrono::DateTime::from_timestamp(1_735_689_600, 0).unwrap(),
            true,
        )
    }

    #[test]
    fn clean_session_reports_no_issues() {
        let s = session(5, 2);
        let rs = vec![
            reservation(s.id, ReservationStatus::Reserved),
            reservation(s.id, ReservationStatus::Reserved),
            reservation(s.id, ReservationStatus::Cancelled),
        ];
        let audit = SessionAudit::compute(&s, &rs);
        assert!(audit.is_clean());
        assert_eq!(audit.reserved_count, 2);
        assert_eq!(audit.waitlisted_count, 0);
    }

    #[test]
    fn drifted_counter_is_reported() {
        let s = session(5, 3);
        let rs = vec![reservation(s.id, ReservationStatus::Reserved)];
        let audit = SessionAudit::compute(&s, &rs);
        assert_eq!(
            audit.issues,
            vec![AuditIssue::OccupiedDrift {
                recorded: 3,
                actual: 1
            }]
        );
    }

    #[test]
    fn overcapacity_counter_is_reported() {
        let s = session(2, 3);
        let rs: Vec<Reservation> = (0..3)
            .map(|_| reservation(s.id, ReservationStatus::Reserved))
            .collect();
        let audit = SessionAudit::compute(&s, &rs);
        assert!(audit
            .issues
            .contains(&AuditIssue::OccupiedExceedsCapacity {
                occupied: 3,
                capacity: 2
            }));
    }

    #[test]
    fn waiting_party_with_free_seat_is_reported() {
        let s = session(3, 1);
        let rs = vec![
            reservation(s.id, ReservationStatus::Reserved),
            reservation(s.id, ReservationStatus::Waitlisted),
        ];
        let audit = SessionAudit::compute(&s, &rs);
        assert!(audit
            .issues
            .contains(&AuditIssue::WaitlistWithFreeCapacity { waiting: 1, free: 2 }));
    }

    #[test]
    fn zero_capacity_session_is_reported() {
        let audit = SessionAudit::compute(&session(0, 0), &[]);
        assert_eq!(audit.issues, vec![AuditIssue::ZeroCapacity]);
    }

    #[test]
    fn report_aggregates_issue_counts() {
        let clean = SessionAudit::compute(&session(2, 0), &[]);
        let dirty = SessionAudit::compute(&session(2, 1), &[]);
        let report = AuditReport {
            sessions: vec![clean, dirty],
        };
        assert!(!report.is_clean());
        assert_eq!(report.issue_count(), 1);
    }
}
