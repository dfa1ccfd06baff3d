//! # Slotbook Core
//!
//! Core types and traits for the Slotbook booking engine.
//!
//! This crate provides the domain model and the transactional contract that
//! the coordinator in `slotbook-engine` builds on:
//!
//! - **Entities**: [`types::Session`], [`types::Reservation`],
//!   [`types::UserQuota`] — mandatory-field structs with an exhaustive
//!   [`types::ReservationStatus`] so illegal states are unrepresentable.
//! - **Decisions**: pure functions in [`decision`] that turn freshly-read
//!   state into a write plan, with no I/O of their own.
//! - **Store abstraction**: [`store::TransactionalStore`], a minimal
//!   begin/commit contract with snapshot isolation and read-set validation.
//! - **Environment seams**: [`environment::Clock`] and
//!   [`notify::NotificationDispatcher`], injected as trait objects.
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell: every business rule lives in a pure
//!   function; the transaction boundary is the sole unit of atomicity.
//! - All reads needed for a decision happen before any write is staged
//!   (read-phase / decision-phase / write-phase).
//! - Explicit `Result` surfaces; conflicts are data, not panics.

pub mod decision;
pub mod environment;
pub mod error;
pub mod notify;
pub mod store;
pub mod types;
pub mod waitlist;

pub use decision::{decide_cancel, decide_reserve, CancelPlan, ReservePlan, ReservePolicy};
pub use environment::{Clock, SystemClock};
pub use error::BookingError;
pub use notify::{NotificationDispatcher, NotifyError, TemplateId};
pub use store::{StoreError, Transaction, TransactionalStore};
pub use types::{Reservation, ReservationId, ReservationStatus, Session, SessionId, UserId, UserQuota};
