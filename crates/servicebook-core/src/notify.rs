//! Messaging and notification collaborators
//!
//! Engine operations collect [`SideEffects`] while their transaction is open
//! and dispatch them after commit. Delivery failures are logged and never
//! undo the committed change.

use async_trait::async_trait;
use serde::Serialize;
use servicebook_types::BookingStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequest,
    BookingAccepted,
    BookingRejected,
    BookingCancelled,
    BookingRescheduled,
    BookingCompleted,
    ClientToConfirm,
    ConfirmationWarning,
    ProviderConfirmed,
    DisputeRaised,
    AdminDispute,
    DisputeResolved,
    PaymentReceived,
    PaymentFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient: Uuid,
    pub booking_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
}

/// Real-time status event for a booking's subscribers
#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub actor: Option<Uuid>,
}

/// System line posted into the booking's conversation
#[derive(Debug, Clone, Serialize)]
pub struct SystemMessage {
    pub booking_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    Notification(Notification),
    SystemMessage(SystemMessage),
    Event(BookingEvent),
}

/// Delivery target for side effects
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> CoreResult<()>;

    async fn post_system_message(&self, message: &SystemMessage) -> CoreResult<()>;

    async fn publish_event(&self, event: &BookingEvent) -> CoreResult<()>;
}

/// Side effects gathered during one unit of work
#[derive(Debug, Default)]
pub struct SideEffects {
    effects: Vec<SideEffect>,
}

/// Outcome of dispatching a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl SideEffects {
    pub fn notify(
        &mut self,
        recipient: Uuid,
        booking_id: Uuid,
        kind: NotificationKind,
        message: impl Into<String>,
    ) {
        self.effects.push(SideEffect::Notification(Notification {
            recipient,
            booking_id,
            kind,
            message: message.into(),
        }));
    }

    pub fn system_message(&mut self, booking_id: Uuid, text: impl Into<String>) {
        self.effects.push(SideEffect::SystemMessage(SystemMessage {
            booking_id,
            text: text.into(),
        }));
    }

    pub fn event(&mut self, booking_id: Uuid, status: BookingStatus, actor: Option<Uuid>) {
        self.effects.push(SideEffect::Event(BookingEvent {
            booking_id,
            status,
            actor,
        }));
    }

    /// System message plus real-time event for a status change
    pub fn status_changed(&mut self, booking_id: Uuid, status: BookingStatus, actor: Option<Uuid>) {
        self.system_message(booking_id, format!("Booking status changed to {}", status));
        self.event(booking_id, status, actor);
    }

    /// Deliver everything. Call only after the transaction committed.
    pub async fn dispatch(self, notifier: &dyn Notifier) -> DispatchReport {
        let mut report = DispatchReport::default();
        for effect in &self.effects {
            let result = match effect {
                SideEffect::Notification(n) => notifier.notify(n).await,
                SideEffect::SystemMessage(m) => notifier.post_system_message(m).await,
                SideEffect::Event(e) => notifier.publish_event(e).await,
            };
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(error = %e, effect = ?effect, "Side effect delivery failed");
                }
            }
        }
        report
    }
}

// =============================================================================
// Implementations
// =============================================================================

/// Logs side effects instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, n: &Notification) -> CoreResult<()> {
        info!(
            recipient = %n.recipient,
            booking_id = %n.booking_id,
            kind = ?n.kind,
            "{}", n.message
        );
        Ok(())
    }

    async fn post_system_message(&self, m: &SystemMessage) -> CoreResult<()> {
        info!(booking_id = %m.booking_id, "system message: {}", m.text);
        Ok(())
    }

    async fn publish_event(&self, e: &BookingEvent) -> CoreResult<()> {
        info!(booking_id = %e.booking_id, status = %e.status, "booking event");
        Ok(())
    }
}

/// Posts each side effect as JSON to the messaging service
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Config(format!("notification client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, effect: &SideEffect) -> CoreResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(effect)
            .send()
            .await
            .map_err(|e| CoreError::Notify(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CoreError::Notify(format!(
                "messaging service returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, n: &Notification) -> CoreResult<()> {
        self.post(&SideEffect::Notification(n.clone())).await
    }

    async fn post_system_message(&self, m: &SystemMessage) -> CoreResult<()> {
        self.post(&SideEffect::SystemMessage(m.clone())).await
    }

    async fn publish_event(&self, e: &BookingEvent) -> CoreResult<()> {
        self.post(&SideEffect::Event(e.clone())).await
    }
}

/// Default notifier for a configured webhook URL
pub fn notifier_from_config(config: &crate::config::NotificationsConfig) -> CoreResult<Arc<dyn Notifier>> {
    match config.webhook_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => {
            let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(5));
            Ok(Arc::new(WebhookNotifier::new(url, timeout)?))
        }
        None => Ok(Arc::new(TracingNotifier)),
    }
}
