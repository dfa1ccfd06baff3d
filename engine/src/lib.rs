//! # Slotbook Engine
//!
//! The transaction coordinator for the Slotbook booking engine.
//!
//! [`BookingCoordinator`] orchestrates `reserve` and `cancel` as single
//! atomic operations spanning the session registry, the reservation ledger,
//! the waitlist, and the visit-quota ledger. Each operation runs as
//! read-phase → pure decision → write-phase inside one store transaction;
//! optimistic conflicts are retried below the API boundary with bounded
//! backoff, and a waitlist promotion notifies the affected user after
//! commit, fire-and-forget.
//!
//! The audit routine ([`BookingCoordinator::audit_all`]) recomputes the
//! authoritative Reserved counts and reports drift in the denormalized
//! occupied counters; it is diagnostic only and never part of the hot path.

pub mod audit;
pub mod config;
pub mod coordinator;
pub mod notify;

pub use audit::{AuditIssue, AuditReport, SessionAudit};
pub use config::BookingConfig;
pub use coordinator::{BookingCoordinator, CancelOutcome, RefundReason, ReserveOutcome};
pub use notify::TracingDispatcher;
