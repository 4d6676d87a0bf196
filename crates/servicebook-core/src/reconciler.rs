//! Temporal reconciler
//!
//! Three jobs per pass, each candidate in its own transaction:
//!
//! - `warn`: awaiting confirmation for 24h, client not yet warned
//! - `auto_confirm`: awaiting confirmation for 48h, complete and release
//! - `auto_resolve`: disputes open past the timeout, resolve for the provider
//!
//! Candidates are re-validated under the row lock, so a pass racing a client
//! confirmation or an admin resolution does nothing.

use chrono::{DateTime, Utc};
use servicebook_db::BookingRepo;
use servicebook_types::{BookingStatus, ConfirmationWindow, ReconcilePolicy, ReconcileReport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::disputes::DisputeEngine;
use crate::engine::EngineContext;
use crate::ledger::EscrowLedger;
use crate::notify::{NotificationKind, SideEffects};
use crate::{metrics, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Warn,
    AutoConfirm,
    AutoResolve,
}

impl Job {
    fn as_str(self) -> &'static str {
        match self {
            Job::Warn => "warn",
            Job::AutoConfirm => "auto_confirm",
            Job::AutoResolve => "auto_resolve",
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    ctx: Arc<EngineContext>,
    disputes: DisputeEngine,
}

impl Reconciler {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let disputes = DisputeEngine::new(ctx.clone());
        Self { ctx, disputes }
    }

    fn policy(&self) -> ReconcilePolicy {
        self.ctx.config.booking.reconcile_policy()
    }

    /// One pass of all jobs. Never fails; per-booking errors are counted.
    pub async fn run_once(&self, now: DateTime<Utc>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let policy = self.policy();
        let batch = self.ctx.config.reconciler.batch_size;

        let candidates = self.candidates(Job::Warn, &policy, now, batch).await;
        let (done, failed) = self
            .each(Job::Warn, candidates, |id| self.warn_client(id, now))
            .await;
        report.warned += done;
        report.failed += failed;

        let candidates = self.candidates(Job::AutoConfirm, &policy, now, batch).await;
        let (done, failed) = self
            .each(Job::AutoConfirm, candidates, |id| self.auto_confirm(id, now))
            .await;
        report.auto_confirmed += done;
        report.failed += failed;

        let candidates = self.candidates(Job::AutoResolve, &policy, now, batch).await;
        let (done, failed) = self
            .each(Job::AutoResolve, candidates, |id| self.disputes.auto_resolve(id, now))
            .await;
        report.auto_resolved += done;
        report.failed += failed;

        report
    }

    /// Run passes on a fixed interval until cancelled
    pub async fn run(self, every: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "Reconciler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.run_once(Utc::now()).await;
                    if report.total_actions() > 0 || report.failed > 0 {
                        info!(
                            warned = report.warned,
                            auto_confirmed = report.auto_confirmed,
                            auto_resolved = report.auto_resolved,
                            failed = report.failed,
                            "Reconciler pass finished"
                        );
                    } else {
                        debug!("Reconciler pass found nothing to do");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Reconciler shutting down");
                    break;
                }
            }
        }
    }

    /// Candidate ids for a job, oldest first
    async fn candidates(
        &self,
        job: Job,
        policy: &ReconcilePolicy,
        now: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<Uuid>> {
        let mut conn = self.ctx.db.pg.acquire().await?;
        let ids = match job {
            Job::Warn => {
                BookingRepo::due_for_warning(
                    &mut conn,
                    policy.warning_cutoff(now),
                    policy.auto_confirm_cutoff(now),
                    limit,
                )
                .await?
            }
            Job::AutoConfirm => {
                BookingRepo::due_for_auto_confirm(&mut conn, policy.auto_confirm_cutoff(now), limit)
                    .await?
            }
            Job::AutoResolve => {
                BookingRepo::stale_disputes(&mut conn, policy.dispute_cutoff(now), limit).await?
            }
        };
        Ok(ids)
    }

    async fn each<F, Fut>(
        &self,
        job: Job,
        candidates: CoreResult<Vec<Uuid>>,
        action: F,
    ) -> (u32, u32)
    where
        F: Fn(Uuid) -> Fut,
        Fut: Future<Output = CoreResult<bool>>,
    {
        let job = job.as_str();
        let ids = match candidates {
            Ok(ids) => ids,
            Err(e) => {
                error!(job, error = %e, "Failed to load reconciler candidates");
                metrics::record_reconciler_failure(job);
                return (0, 1);
            }
        };

        let (mut done, mut failed) = (0, 0);
        for booking_id in ids {
            match action(booking_id).await {
                Ok(true) => {
                    done += 1;
                    metrics::record_reconciler_action(job);
                }
                Ok(false) => debug!(job, %booking_id, "Candidate no longer due"),
                Err(e) => {
                    failed += 1;
                    metrics::record_reconciler_failure(job);
                    warn!(job, %booking_id, error = %e, "Reconciler action failed");
                }
            }
        }
        (done, failed)
    }

    /// Send the one-time confirmation reminder
    async fn warn_client(&self, booking_id: Uuid, now: DateTime<Utc>) -> CoreResult<bool> {
        let policy = self.policy();
        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;

        let due = booking.status()? == BookingStatus::AwaitingConfirmation
            && booking.confirmation_warning_sent_at.is_none()
            && booking
                .provider_completed_at
                .is_some_and(|at| policy.classify(at, now) == ConfirmationWindow::Warn);
        if !due {
            return Ok(false);
        }

        BookingRepo::mark_warning_sent(&mut *tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        let remaining = policy.auto_confirm_after - policy.warning_after;

        let mut effects = SideEffects::default();
        effects.notify(
            participants.client,
            booking_id,
            NotificationKind::ConfirmationWarning,
            format!(
                "Please confirm your booking. It will be confirmed automatically in {} hours.",
                remaining.num_hours()
            ),
        );
        self.ctx.commit(tx, effects).await?;
        debug!(%booking_id, "Confirmation warning sent");
        Ok(true)
    }

    /// Complete a booking the client never confirmed and release escrow
    async fn auto_confirm(&self, booking_id: Uuid, now: DateTime<Utc>) -> CoreResult<bool> {
        let policy = self.policy();
        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;

        let due = booking.status()? == BookingStatus::AwaitingConfirmation
            && booking.client_confirmed_at.is_none()
            && booking
                .provider_completed_at
                .is_some_and(|at| policy.classify(at, now) == ConfirmationWindow::Expired);
        if !due {
            return Ok(false);
        }

        BookingRepo::mark_completed(&mut *tx, booking_id, false).await?;
        let released = EscrowLedger::release_for_booking(&mut *tx, booking_id)
            .await?
            .map(|s| s.released())
            .unwrap_or_default();
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;

        let mut effects = SideEffects::default();
        effects.notify(
            participants.provider,
            booking_id,
            NotificationKind::BookingCompleted,
            format!("Booking confirmed automatically. {} is now available.", released),
        );
        effects.notify(
            participants.client,
            booking_id,
            NotificationKind::BookingCompleted,
            "Your booking was confirmed automatically",
        );
        effects.status_changed(booking_id, BookingStatus::Completed, None);
        self.ctx.commit(tx, effects).await?;
        info!(%booking_id, %released, "Booking auto-confirmed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_context;

    #[tokio::test]
    async fn test_unreachable_database_counts_failures() {
        let reconciler = Reconciler::new(Arc::new(test_context()));
        let report = reconciler.run_once(Utc::now()).await;
        assert_eq!(report.total_actions(), 0);
        assert_eq!(report.failed, 3);
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let reconciler = Reconciler::new(Arc::new(test_context()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(
            Duration::from_secs(5),
            reconciler.run(Duration::from_secs(3600), cancel),
        )
        .await
        .expect("reconciler did not stop");
    }
}
