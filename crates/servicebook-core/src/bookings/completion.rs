//! Provider completion and client confirmation

use serde::Deserialize;
use servicebook_db::{BookingRepo, DbBooking, DbEvidence, EvidenceRepo, IdentityRepo, NewEvidence};
use servicebook_types::{validate_dispute_reason, Actor, BookingStatus, DomainError, EvidenceType, Role};
use tracing::{info, instrument};
use uuid::Uuid;

use super::BookingService;
use crate::ledger::EscrowLedger;
use crate::notify::{NotificationKind, SideEffects};
use crate::{CoreError, CoreResult};

/// One uploaded evidence file
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceInput {
    #[serde(default)]
    pub evidence_type: EvidenceType,
    pub file_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteBooking {
    pub evidence: Vec<EvidenceInput>,
    pub notes: Option<String>,
}

impl CompleteBooking {
    fn validated_evidence(&self) -> CoreResult<Vec<NewEvidence>> {
        if self.evidence.is_empty() {
            return Err(CoreError::validation("at least one evidence file is required"));
        }
        self.evidence
            .iter()
            .map(|e| {
                let file_url = e.file_url.trim();
                if file_url.is_empty() {
                    return Err(CoreError::validation("evidence file_url must not be empty"));
                }
                Ok(NewEvidence {
                    evidence_type: e.evidence_type,
                    file_url: file_url.to_string(),
                    description: e.description.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmBooking {
    pub confirmed: bool,
    pub reason: Option<String>,
}

impl BookingService {
    /// Provider reports the work done. Funds stay in escrow.
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn complete_with_evidence(
        &self,
        actor: Actor,
        booking_id: Uuid,
        request: CompleteBooking,
    ) -> CoreResult<(DbBooking, Vec<DbEvidence>)> {
        actor.require(Role::Provider)?;
        let evidence = request.validated_evidence()?;

        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        participants.require_provider(&actor)?;
        booking
            .status()?
            .transition_to(BookingStatus::AwaitingConfirmation)?;

        let mut stored = Vec::with_capacity(evidence.len());
        for item in &evidence {
            stored.push(EvidenceRepo::insert(&mut *tx, booking_id, actor.user_id, item).await?);
        }
        let notes = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let booking = BookingRepo::mark_provider_completed(&mut *tx, booking_id, notes).await?;

        let mut effects = SideEffects::default();
        effects.notify(
            participants.client,
            booking_id,
            NotificationKind::ClientToConfirm,
            "The provider marked your booking as completed. Please confirm or raise a dispute.",
        );
        effects.status_changed(booking_id, BookingStatus::AwaitingConfirmation, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        info!(%booking_id, evidence = stored.len(), "Completion submitted");
        Ok((booking, stored))
    }

    /// Client accepts the completion (releasing escrow) or disputes it
    #[instrument(skip(self, request), fields(user_id = %actor.user_id, confirmed = request.confirmed))]
    pub async fn confirm(&self, actor: Actor, booking_id: Uuid, request: ConfirmBooking) -> CoreResult<DbBooking> {
        actor.require(Role::Client)?;
        let dispute_reason = if request.confirmed {
            None
        } else {
            Some(validate_dispute_reason(
                request.reason.as_deref(),
                self.ctx.config.booking.min_dispute_reason_len,
            )?)
        };

        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        participants.require_client(&actor)?;

        let status = booking.status()?;
        let target = match dispute_reason {
            None => BookingStatus::Completed,
            Some(_) => BookingStatus::Disputed,
        };
        if status != BookingStatus::AwaitingConfirmation {
            return Err(DomainError::InvalidTransition {
                from: status.to_string(),
                to: target.to_string(),
            }
            .into());
        }

        let mut effects = SideEffects::default();
        let booking = match dispute_reason {
            None => {
                let booking = BookingRepo::mark_completed(&mut *tx, booking_id, true).await?;
                let settlement = EscrowLedger::release_for_booking(&mut *tx, booking_id).await?;
                let released = settlement.map(|s| s.released()).unwrap_or_default();
                effects.notify(
                    participants.provider,
                    booking_id,
                    NotificationKind::ProviderConfirmed,
                    format!("The client confirmed completion. {} is now available.", released),
                );
                info!(%booking_id, %released, "Completion confirmed");
                booking
            }
            Some(reason) => {
                let booking = BookingRepo::raise_dispute(&mut *tx, booking_id, &reason).await?;
                for admin in IdentityRepo::admin_ids(&mut *tx).await? {
                    effects.notify(
                        admin,
                        booking_id,
                        NotificationKind::AdminDispute,
                        format!("Dispute raised on booking {}: {}", booking_id, reason),
                    );
                }
                effects.notify(
                    participants.provider,
                    booking_id,
                    NotificationKind::DisputeRaised,
                    format!("The client disputed the completion: {}", reason),
                );
                info!(%booking_id, "Dispute raised");
                booking
            }
        };
        effects.status_changed(booking_id, target, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        Ok(booking)
    }
}
