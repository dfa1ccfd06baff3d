//! Default notification sink.

use slotbook_core::notify::{NotificationDispatcher, NotifyError, TemplateId};
use slotbook_core::types::UserId;
use std::future::Future;
use std::pin::Pin;

/// Dispatcher that records the promotion in the log instead of delivering
/// it.
///
/// Delivery mechanics (WhatsApp, push, email) belong to the surrounding
/// application; this is the engine's default sink so promotions are never
/// silently dropped when no channel is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

impl NotificationDispatcher for TracingDispatcher {
    fn dispatch(
        &self,
        recipient: UserId,
        template: &TemplateId,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        let template = template.clone();
        Box::pin(async move {
            tracing::info!(%recipient, %template, "promotion notification");
            Ok(())
        })
    }
}
