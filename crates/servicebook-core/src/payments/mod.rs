//! Payment orchestration
//!
//! Bridges bookings and the external gateway. Every status the gateway
//! reports, whether from a client round-trip or a webhook, goes through
//! [`PaymentOrchestrator::apply_gateway_status`] under the payment row lock,
//! which makes the escrow credit run at most once. A capture that lands after
//! its booking was cancelled or completed is settled on the spot, so nothing
//! is left behind in pending.

mod gateway;
mod webhook;

pub use gateway::{CreateIntentRequest, GatewayError, GatewayIntent, HttpGateway, PaymentGateway};
pub use webhook::{
    compute_signature, parse_event, parse_signature_header, verify_signature, SignatureHeader,
    WebhookEvent, WebhookEventKind,
};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use servicebook_db::{BookingRepo, DbPayment, NewPayment, PaymentRepo};
use servicebook_types::{
    decide_intent, idempotency_key, to_minor_units, Actor, BookingStatus, CaptureEscrow,
    CommissionSplit, IntentDecision, PaymentStatus, Role, SettlementSplit,
};
use sqlx::PgConnection;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::engine::EngineContext;
use crate::ledger::EscrowLedger;
use crate::notify::{NotificationKind, SideEffects};
use crate::{metrics, CoreError, CoreResult};

/// What the client needs to complete payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub gateway_intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub status: PaymentStatus,
    pub gross_amount: Decimal,
    pub commission_amount: Decimal,
    pub net_provider_amount: Decimal,
    /// An in-flight intent was handed back instead of creating one
    pub reused: bool,
}

impl PaymentIntent {
    fn from_payment(payment: &DbPayment, reused: bool) -> CoreResult<Self> {
        Ok(Self {
            payment_id: payment.id,
            booking_id: payment.booking_id,
            gateway_intent_id: payment.gateway_intent_id.clone(),
            client_secret: payment.client_secret.clone(),
            status: payment.status()?,
            gross_amount: payment.gross_amount,
            commission_amount: payment.commission_amount,
            net_provider_amount: payment.net_provider_amount,
            reused,
        })
    }
}

/// How a webhook delivery was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    Ignored,
}

/// Result of applying a gateway status to a locked payment
struct StatusUpdate {
    payment: DbPayment,
    captured: bool,
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    ctx: Arc<EngineContext>,
}

impl PaymentOrchestrator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Create (or hand back) the payment intent for a booking
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn create_intent(&self, actor: Actor, booking_id: Uuid) -> CoreResult<PaymentIntent> {
        actor.require(Role::Client)?;

        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        participants.require_client(&actor)?;

        let status = booking.status()?;
        if !matches!(status, BookingStatus::Accepted | BookingStatus::Confirmed) {
            return Err(CoreError::conflict(format!(
                "booking must be accepted or confirmed before payment, it is {}",
                status
            )));
        }

        let existing = PaymentRepo::lock_by_booking(&mut *tx, booking_id).await?;
        let existing_status = existing.as_ref().map(|p| p.status()).transpose()?;

        let split = CommissionSplit::compute(booking.total_price, self.ctx.config.booking.commission_rate)?;
        let payments = &self.ctx.config.payments;
        let mut metadata = BTreeMap::new();
        metadata.insert("booking_id".to_string(), booking_id.to_string());
        metadata.insert("client_id".to_string(), participants.client.to_string());
        metadata.insert("provider_id".to_string(), participants.provider.to_string());

        let key = idempotency_key(booking_id, participants.client);
        let mut effects = SideEffects::default();

        let update = match (decide_intent(existing_status), existing) {
            (IntentDecision::AlreadyPaid, _) => {
                return Err(CoreError::conflict("booking has already been paid"));
            }
            (IntentDecision::ReuseExisting, Some(payment)) => {
                debug!(%booking_id, payment_id = %payment.id, "Reusing in-flight payment intent");
                return PaymentIntent::from_payment(&payment, true);
            }
            (IntentDecision::Rearm, Some(payment)) => {
                // The failed intent consumed the base key at the gateway
                let gateway_key = format!("{}:{}", key, payment.updated_at.timestamp_millis());
                let intent = self
                    .ctx
                    .gateway
                    .create_intent(&CreateIntentRequest {
                        amount: to_minor_units(split.gross)?,
                        currency: payments.currency.clone(),
                        payment_method_types: payments.payment_method_types.clone(),
                        idempotency_key: gateway_key,
                        metadata,
                    })
                    .await?;
                let payment = PaymentRepo::rearm(
                    &mut *tx,
                    payment.id,
                    &split,
                    &intent.id,
                    intent.client_secret.as_deref(),
                )
                .await?;
                info!(%booking_id, payment_id = %payment.id, intent_id = %intent.id, "Payment intent re-armed");
                self.apply_gateway_status(
                    &mut *tx,
                    payment,
                    status,
                    PaymentStatus::from_gateway(&intent.status),
                    intent.failure_message(),
                    &mut effects,
                )
                .await?
            }
            _ => {
                let intent = self
                    .ctx
                    .gateway
                    .create_intent(&CreateIntentRequest {
                        amount: to_minor_units(split.gross)?,
                        currency: payments.currency.clone(),
                        payment_method_types: payments.payment_method_types.clone(),
                        idempotency_key: key.clone(),
                        metadata,
                    })
                    .await?;
                let payment = PaymentRepo::insert(
                    &mut *tx,
                    &NewPayment {
                        booking_id,
                        client_id: participants.client,
                        provider_id: participants.provider,
                        split,
                        idempotency_key: key,
                        gateway_intent_id: intent.id.clone(),
                        client_secret: intent.client_secret.clone(),
                    },
                )
                .await?;
                info!(%booking_id, payment_id = %payment.id, intent_id = %intent.id, "Payment intent created");
                self.apply_gateway_status(
                    &mut *tx,
                    payment,
                    status,
                    PaymentStatus::from_gateway(&intent.status),
                    intent.failure_message(),
                    &mut effects,
                )
                .await?
            }
        };

        BookingRepo::set_payment_status(&mut *tx, booking_id, update.payment.status()?).await?;
        self.ctx.commit(tx, effects).await?;
        if update.captured {
            metrics::record_payment_succeeded();
        }
        PaymentIntent::from_payment(&update.payment, false)
    }

    /// Attach a payment method to the booking's intent
    #[instrument(skip(self, payment_method_id), fields(user_id = %actor.user_id))]
    pub async fn attach_method(
        &self,
        actor: Actor,
        booking_id: Uuid,
        payment_method_id: &str,
    ) -> CoreResult<DbPayment> {
        if payment_method_id.trim().is_empty() {
            return Err(CoreError::validation("payment_method_id is required"));
        }
        self.round_trip(actor, booking_id, true, |gateway, intent_id| {
            let method = payment_method_id.to_string();
            async move { gateway.attach_method(&intent_id, &method).await }
        })
        .await
    }

    /// Re-read the intent from the gateway and apply its status. Allowed
    /// in any booking status: money the gateway already captured is settled
    /// against wherever the booking ended up.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn confirm(&self, actor: Actor, booking_id: Uuid) -> CoreResult<DbPayment> {
        self.round_trip(actor, booking_id, false, |gateway, intent_id| async move {
            gateway.retrieve_intent(&intent_id).await
        })
        .await
    }

    async fn round_trip<F, Fut>(
        &self,
        actor: Actor,
        booking_id: Uuid,
        require_payable: bool,
        call: F,
    ) -> CoreResult<DbPayment>
    where
        F: FnOnce(Arc<dyn PaymentGateway>, String) -> Fut,
        Fut: std::future::Future<Output = CoreResult<GatewayIntent>>,
    {
        actor.require(Role::Client)?;

        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        self.ctx
            .resolver
            .participants(&mut *tx, &booking)
            .await?
            .require_client(&actor)?;

        let booking_status = booking.status()?;
        if require_payable && !booking_status.is_active() {
            return Err(CoreError::conflict(format!(
                "booking is {}, payments can only be made on accepted or confirmed bookings",
                booking_status
            )));
        }

        let payment = PaymentRepo::lock_by_booking(&mut *tx, booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("payment for booking", booking_id))?;
        if payment.status()?.was_captured() {
            debug!(%booking_id, payment_id = %payment.id, "Payment already captured");
            return Ok(payment);
        }
        let intent_id = payment
            .gateway_intent_id
            .clone()
            .ok_or_else(|| CoreError::conflict("payment has no gateway intent"))?;

        let intent = call(self.ctx.gateway.clone(), intent_id).await?;
        let mut effects = SideEffects::default();
        let mut update = self
            .apply_gateway_status(
                &mut *tx,
                payment,
                booking_status,
                PaymentStatus::from_gateway(&intent.status),
                intent.failure_message(),
                &mut effects,
            )
            .await?;
        if let Some(method) = intent_method(&intent) {
            update.payment = PaymentRepo::set_method(&mut *tx, update.payment.id, method).await?;
        }

        self.ctx.commit(tx, effects).await?;
        if update.captured {
            metrics::record_payment_succeeded();
        }
        Ok(update.payment)
    }

    /// Verify and apply an inbound gateway webhook
    pub async fn handle_webhook(&self, body: &[u8], signature: Option<&str>) -> CoreResult<WebhookOutcome> {
        let payments = &self.ctx.config.payments;
        verify_signature(
            &payments.webhook_secret,
            signature,
            body,
            Utc::now().timestamp(),
            payments.webhook_tolerance_secs,
        )?;
        let event = parse_event(body)?;

        let status = match &event.kind {
            WebhookEventKind::PaymentSucceeded => PaymentStatus::Succeeded,
            WebhookEventKind::PaymentFailed => PaymentStatus::Failed,
            WebhookEventKind::Other(kind) => {
                debug!(event_type = %kind, "Ignoring webhook event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let mut tx = self.ctx.db.begin().await?;
        let Some(found) = PaymentRepo::find_by_intent(&mut *tx, &event.intent_id).await? else {
            warn!(intent_id = %event.intent_id, "Webhook for unknown payment intent");
            return Ok(WebhookOutcome::Ignored);
        };

        // Booking first, then payment: the same lock order as the client paths
        let Some(booking) = BookingRepo::lock_by_id(&mut *tx, found.booking_id).await? else {
            warn!(intent_id = %event.intent_id, booking_id = %found.booking_id, "Webhook for deleted booking");
            return Ok(WebhookOutcome::Ignored);
        };
        let payment = match PaymentRepo::lock_by_booking(&mut *tx, found.booking_id).await? {
            Some(p) if p.gateway_intent_id.as_deref() == Some(event.intent_id.as_str()) => p,
            _ => {
                debug!(intent_id = %event.intent_id, "Payment moved to another intent, ignoring webhook");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let mut effects = SideEffects::default();
        let update = self
            .apply_gateway_status(
                &mut *tx,
                payment,
                booking.status()?,
                status,
                event.failure_message.as_deref(),
                &mut effects,
            )
            .await?;
        self.ctx.commit(tx, effects).await?;
        if update.captured {
            metrics::record_payment_succeeded();
        }
        info!(intent_id = %event.intent_id, status = %status, "Webhook applied");
        Ok(WebhookOutcome::Applied)
    }

    /// Payment visible to its client, its provider and admins
    pub async fn get_payment(&self, actor: Actor, payment_id: Uuid) -> CoreResult<DbPayment> {
        let mut conn = self.ctx.db.pg.acquire().await?;
        let payment = PaymentRepo::find_by_id(&mut conn, payment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("payment", payment_id))?;
        payment.participants().require_participant(&actor, true)?;
        Ok(payment)
    }

    /// Move a locked payment to the status reported by the gateway.
    /// Idempotent: repeated reports of the same status change nothing.
    /// `booking_status` is read under the booking lock by the caller.
    async fn apply_gateway_status(
        &self,
        conn: &mut PgConnection,
        payment: DbPayment,
        booking_status: BookingStatus,
        status: PaymentStatus,
        failure_reason: Option<&str>,
        effects: &mut SideEffects,
    ) -> CoreResult<StatusUpdate> {
        let current = payment.status()?;
        let booking_id = payment.booking_id;

        match status {
            PaymentStatus::Succeeded if !current.was_captured() => {
                let payment =
                    PaymentRepo::set_status(&mut *conn, payment.id, PaymentStatus::Succeeded, None).await?;
                BookingRepo::set_payment_status(&mut *conn, booking_id, PaymentStatus::Succeeded).await?;
                EscrowLedger::credit_payment(&mut *conn, &payment).await?;
                info!(%booking_id, payment_id = %payment.id, "Payment succeeded");

                let payment = match CaptureEscrow::for_booking(booking_status) {
                    CaptureEscrow::Hold => {
                        effects.notify(
                            payment.provider_id,
                            booking_id,
                            NotificationKind::PaymentReceived,
                            format!(
                                "Payment of {} received. {} is held in escrow until the booking completes.",
                                payment.gross_amount, payment.net_provider_amount
                            ),
                        );
                        payment
                    }
                    CaptureEscrow::Release => {
                        let settlement = EscrowLedger::release_payment(&mut *conn, &payment).await?;
                        effects.notify(
                            payment.provider_id,
                            booking_id,
                            NotificationKind::PaymentReceived,
                            format!(
                                "Payment of {} received for a completed booking. {} is available.",
                                payment.gross_amount,
                                settlement.released()
                            ),
                        );
                        info!(%booking_id, payment_id = %payment.id, released = %settlement.released(), "Late capture released");
                        payment
                    }
                    CaptureEscrow::Refund => {
                        let split = SettlementSplit::full_refund(payment.net_provider_amount);
                        let settlement = EscrowLedger::settle(&mut *conn, &payment, &split, None).await?;
                        let payment = PaymentRepo::record_refund(
                            &mut *conn,
                            payment.id,
                            settlement.refunded(),
                            PaymentStatus::Refunded,
                        )
                        .await?;
                        BookingRepo::set_payment_status(&mut *conn, booking_id, PaymentStatus::Refunded)
                            .await?;
                        effects.notify(
                            payment.client_id,
                            booking_id,
                            NotificationKind::BookingCancelled,
                            format!(
                                "Your payment of {} arrived after the booking ended and is being refunded.",
                                payment.gross_amount
                            ),
                        );
                        warn!(
                            %booking_id,
                            payment_id = %payment.id,
                            booking_status = %booking_status,
                            refunded = %settlement.refunded(),
                            "Capture after booking ended, escrow refunded"
                        );
                        payment
                    }
                };
                Ok(StatusUpdate {
                    payment,
                    captured: true,
                })
            }
            PaymentStatus::Failed if current.is_in_flight() => {
                let reason = failure_reason.unwrap_or("payment failed");
                let payment =
                    PaymentRepo::set_status(&mut *conn, payment.id, PaymentStatus::Failed, Some(reason))
                        .await?;
                BookingRepo::set_payment_status(&mut *conn, booking_id, PaymentStatus::Failed).await?;
                effects.notify(
                    payment.client_id,
                    booking_id,
                    NotificationKind::PaymentFailed,
                    format!("Your payment could not be completed: {}", reason),
                );
                warn!(%booking_id, payment_id = %payment.id, reason, "Payment failed");
                Ok(StatusUpdate {
                    payment,
                    captured: false,
                })
            }
            PaymentStatus::Processing if current == PaymentStatus::Pending => {
                let payment =
                    PaymentRepo::set_status(&mut *conn, payment.id, PaymentStatus::Processing, None).await?;
                BookingRepo::set_payment_status(&mut *conn, booking_id, PaymentStatus::Processing).await?;
                Ok(StatusUpdate {
                    payment,
                    captured: false,
                })
            }
            _ => {
                debug!(%booking_id, current = %current, reported = %status, "Gateway status changes nothing");
                Ok(StatusUpdate {
                    payment,
                    captured: false,
                })
            }
        }
    }
}

/// Payment method id echoed back by the gateway, if any
fn intent_method(intent: &GatewayIntent) -> Option<&str> {
    intent.payment_method.as_deref().filter(|m| !m.is_empty())
}
