//! The transaction coordinator.
//!
//! `reserve` and `cancel` each run as one atomic read-modify-write across
//! the session, the reservation set, the waitlist, and the quota account:
//!
//! 1. **read phase** — everything the decision needs is read from one
//!    transaction snapshot; nothing caller-cached is trusted.
//! 2. **decision phase** — a pure function from `slotbook_core::decision`
//!    turns the reads into a write plan or a business-rule rejection.
//! 3. **write phase** — exactly the writes the plan names are staged and
//!    committed all-or-nothing.
//!
//! Commit conflicts are retried here with bounded linear backoff; business
//! rejections surface immediately and are never retried.

use crate::config::BookingConfig;
use serde::{Deserialize, Serialize};
use slotbook_core::decision::{
    decide_cancel, decide_reserve, CancelContext, ReserveContext, ReservePolicy,
};
use slotbook_core::environment::Clock;
use slotbook_core::error::BookingError;
use slotbook_core::notify::NotificationDispatcher;
use slotbook_core::store::{StoreError, TransactionalStore};
use slotbook_core::types::{
    Reservation, ReservationId, ReservationStatus, SessionId, UserId,
};
use std::fmt;
use std::sync::Arc;

/// Result of a successful `reserve`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveOutcome {
    /// The new reservation's id.
    pub reservation_id: ReservationId,
    /// Reserved when capacity remained, Waitlisted otherwise.
    pub status: ReservationStatus,
}

/// Why a cancellation did or did not refund a visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundReason {
    /// A quota unit was deducted at creation and has been credited back.
    VisitWasDeducted,
    /// No quota unit was ever deducted for this reservation.
    NotDeducted,
}

impl fmt::Display for RefundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VisitWasDeducted => write!(f, "visit_was_deducted"),
            Self::NotDeducted => write!(f, "not_deducted"),
        }
    }
}

/// Result of a successful `cancel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    /// Whether a quota unit was credited back.
    pub refunded: bool,
    /// The audit note for the refund decision.
    pub refund_reason: RefundReason,
    /// The user promoted from the waitlist, if any.
    pub promoted_user: Option<UserId>,
}

/// Orchestrates `reserve` and `cancel` as single atomic operations.
///
/// Stateless apart from injected collaborators; safe to share behind an
/// `Arc` and call concurrently.
pub struct BookingCoordinator {
    pub(crate) store: Arc<dyn TransactionalStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
}

impl BookingCoordinator {
    /// Creates a coordinator over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Reserve a slot in `session_id` for `user`, or join the waitlist when
    /// the session is full.
    ///
    /// Quota is deducted identically for both outcomes: the risk of
    /// occupying a slot in the future is charged immediately.
    ///
    /// # Errors
    ///
    /// Business-rule rejections ([`BookingError::SessionClosed`],
    /// [`BookingError::DuplicateReservation`],
    /// [`BookingError::DailyLimitExceeded`],
    /// [`BookingError::QuotaExhausted`], [`BookingError::SessionNotFound`])
    /// surface verbatim. [`BookingError::TransientFailure`] after exhausted
    /// conflict retries.
    pub async fn reserve(
        &self,
        session_id: SessionId,
        user: UserId,
    ) -> Result<ReserveOutcome, BookingError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let now = self.clock.now();
            let mut tx = self.store.begin().await?;

            // Read phase.
            let session = tx.session(session_id);
            let session_reservations = tx.reservations_for_session(session_id);
            let user_reservations = tx.reservations_for_user(user);
            let mut user_active_dates = Vec::new();
            for r in user_reservations.iter().filter(|r| r.is_active()) {
                let date = if r.session_id == session_id {
                    session.as_ref().map(|s| s.date)
                } else {
                    tx.session(r.session_id).map(|s| s.date)
                };
                if let Some(date) = date {
                    user_active_dates.push((r.session_id, date));
                }
            }
            let quota = tx.quota(user);

            // Decision phase.
            let plan = decide_reserve(
                session_id,
                user,
                now,
                &ReserveContext {
                    session: session.as_ref(),
                    session_reservations: &session_reservations,
                    user_active_dates: &user_active_dates,
                    quota: quota.as_ref(),
                },
                &ReservePolicy {
                    quota_floor: self.config.quota_floor,
                    privileged_user: self.config.privileged_user,
                },
            )?;

            // Write phase.
            let reservation =
                Reservation::new(session_id, user, plan.status, now, plan.deduct_quota);
            let reservation_id = reservation.id;
            tx.put_reservation(reservation);
            if plan.status == ReservationStatus::Reserved {
                if let Some(mut s) = session {
                    s.take_slot();
                    tx.put_session(s);
                }
            }
            if plan.deduct_quota {
                if let Some(q) = quota {
                    tx.put_quota(q.deducted(self.config.quota_floor));
                }
            }

            match self.store.commit(tx).await {
                Ok(()) => {
                    tracing::info!(
                        %session_id,
                        %user,
                        %reservation_id,
                        status = %plan.status,
                        "reservation committed"
                    );
                    return Ok(ReserveOutcome {
                        reservation_id,
                        status: plan.status,
                    });
                }
                Err(StoreError::Conflict { .. }) if attempts < self.config.max_attempts => {
                    tracing::debug!(%session_id, %user, attempts, "reserve conflicted, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempts).await;
                }
                Err(StoreError::Conflict { .. }) => {
                    return Err(BookingError::TransientFailure { attempts });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Cancel a reservation, refunding the quota unit iff one was deducted
    /// and promoting the earliest waitlisted party when a slot was freed.
    ///
    /// Idempotent: cancelling an already-cancelled reservation answers
    /// [`BookingError::AlreadyCancelled`] without touching counters or
    /// quota.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] for unknown ids;
    /// [`BookingError::AlreadyCancelled`] as the benign nothing-to-do case;
    /// [`BookingError::TransientFailure`] after exhausted conflict retries.
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
    ) -> Result<CancelOutcome, BookingError> {
        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            let now = self.clock.now();
            let mut tx = self.store.begin().await?;

            // Read phase.
            let reservation = tx.reservation(reservation_id);
            let session = reservation.as_ref().and_then(|r| tx.session(r.session_id));
            let session_reservations = reservation
                .as_ref()
                .map(|r| tx.reservations_for_session(r.session_id))
                .unwrap_or_default();
            let quota = reservation.as_ref().and_then(|r| tx.quota(r.user_id));

            // Decision phase.
            let plan = decide_cancel(
                reservation_id,
                &CancelContext {
                    reservation: reservation.as_ref(),
                    session: session.as_ref(),
                    session_reservations: &session_reservations,
                    quota: quota.as_ref(),
                },
            )?;

            // Write phase. The decision guarantees the record exists.
            let Some(mut cancelled) = reservation else {
                return Err(BookingError::ReservationNotFound(reservation_id));
            };
            cancelled.cancel(now, plan.refunded);
            tx.put_reservation(cancelled);

            if plan.was_reserved {
                if let Some(mut s) = session {
                    s.release_slot();
                    if let Some((promote_id, _)) = plan.promote {
                        if let Some(mut next) = session_reservations
                            .iter()
                            .find(|r| r.id == promote_id)
                            .cloned()
                        {
                            next.promote();
                            tx.put_reservation(next);
                            // The freed slot is immediately re-taken.
                            s.take_slot();
                        }
                    }
                    tx.put_session(s);
                }
            }
            if plan.credit_quota {
                if let Some(q) = quota {
                    tx.put_quota(q.credited());
                }
            }

            match self.store.commit(tx).await {
                Ok(()) => {
                    let refund_reason = if plan.refunded {
                        RefundReason::VisitWasDeducted
                    } else {
                        RefundReason::NotDeducted
                    };
                    tracing::info!(
                        %reservation_id,
                        refunded = plan.refunded,
                        promoted = plan.promote.is_some(),
                        "cancellation committed"
                    );
                    break CancelOutcome {
                        refunded: plan.refunded,
                        refund_reason,
                        promoted_user: plan.promote.map(|(_, promoted)| promoted),
                    };
                }
                Err(StoreError::Conflict { .. }) if attempts < self.config.max_attempts => {
                    tracing::debug!(%reservation_id, attempts, "cancel conflicted, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempts).await;
                }
                Err(StoreError::Conflict { .. }) => {
                    return Err(BookingError::TransientFailure { attempts });
                }
                Err(err) => return Err(err.into()),
            }
        };

        // Notification happens outside the transaction; a delivery failure
        // never rolls back the committed cancellation.
        if let Some(promoted) = outcome.promoted_user {
            if let Err(err) = self
                .dispatcher
                .dispatch(promoted, &self.config.promotion_template)
                .await
            {
                tracing::warn!(%promoted, error = %err, "promotion notification failed");
            }
        }

        Ok(outcome)
    }
}
