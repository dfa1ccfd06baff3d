//! Notification dispatch seam.
//!
//! Promotions notify the affected user through this trait, outside the
//! transaction and fire-and-forget: a delivery failure never rolls back a
//! committed cancellation. Delivery mechanics (WhatsApp, push, ...) live in
//! whatever implements the trait; the engine only knows recipient and
//! template.

use crate::types::UserId;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Identifier of a message template understood by the delivery channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TemplateId(String);

impl TemplateId {
    /// Creates a template id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The template id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from the delivery channel.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The channel rejected or failed to deliver the message.
    #[error("notification channel error: {0}")]
    Channel(String),
}

/// External sink that informs a user of a promotion.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` to
/// enable trait object usage (`Arc<dyn NotificationDispatcher>`).
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver `template` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the channel fails; callers treat this as
    /// fire-and-forget and must not roll back on failure.
    fn dispatch(
        &self,
        recipient: UserId,
        template: &TemplateId,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}
