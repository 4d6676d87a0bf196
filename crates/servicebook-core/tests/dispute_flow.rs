//! Disputes: admin resolution and timeout auto-resolution

mod common;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use servicebook_core::{
    CompleteBooking, ConfirmBooking, CoreError, CreateBooking, Engine, EvidenceInput,
    ResolveDispute,
};
use servicebook_db::{DbBooking, PaymentRepo, WalletRepo};
use servicebook_types::{
    Actor, BookingMode, BookingStatus, DisputeFavor, DomainError, EvidenceType, PaymentStatus, Role,
};

use common::{engine, seed_service, seed_user};

/// A paid booking awaiting client confirmation
async fn completed_paid_booking(engine: &Engine, client: Actor, provider: Actor, day: u32) -> DbBooking {
    let service_id = seed_service(engine, &provider, dec!(800), 60).await;
    let booking = engine
        .bookings
        .create(
            client,
            CreateBooking {
                provider_id: None,
                service_id,
                start: Utc.with_ymd_and_hms(2025, 2, day, 10, 0, 0).unwrap(),
                end: None,
                total_price: dec!(1000),
                mode: BookingMode::Instant,
                notes: None,
            },
        )
        .await
        .unwrap();
    engine.payments.create_intent(client, booking.id).await.unwrap();
    engine.payments.confirm(client, booking.id).await.unwrap();
    let (booking, _) = engine
        .bookings
        .complete_with_evidence(
            provider,
            booking.id,
            CompleteBooking {
                evidence: vec![EvidenceInput {
                    evidence_type: EvidenceType::Other,
                    file_url: "https://files.test/report.pdf".into(),
                    description: Some("report".into()),
                }],
                notes: None,
            },
        )
        .await
        .unwrap();
    booking
}

fn dispute() -> ConfirmBooking {
    ConfirmBooking {
        confirmed: false,
        reason: Some("item never arrived at venue".into()),
    }
}

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_short_dispute_reason_is_rejected() {
    let engine = engine().await;
    let client = seed_user(&engine, Role::Client).await;
    let provider = seed_user(&engine, Role::Provider).await;
    let booking = completed_paid_booking(&engine, client, provider, 3).await;

    let err = engine
        .bookings
        .confirm(
            client,
            booking.id,
            ConfirmBooking {
                confirmed: false,
                reason: Some("bad".into()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Domain(DomainError::Validation(_))));
}

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_full_refund_for_client() {
    let engine = engine().await;
    let client = seed_user(&engine, Role::Client).await;
    let provider = seed_user(&engine, Role::Provider).await;
    let admin = seed_user(&engine, Role::Admin).await;
    let booking = completed_paid_booking(&engine, client, provider, 4).await;

    let disputed = engine.bookings.confirm(client, booking.id, dispute()).await.unwrap();
    assert_eq!(disputed.status().unwrap(), BookingStatus::Disputed);

    let resolved = engine
        .disputes
        .resolve(
            admin,
            booking.id,
            ResolveDispute {
                resolution: "Refund approved".into(),
                favor: DisputeFavor::Client,
                refund_percentage: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status().unwrap(), BookingStatus::Cancelled);

    let wallet = engine.wallets.summary(provider).await.unwrap();
    assert_eq!(wallet.balances.pending, dec!(0.00));
    assert_eq!(wallet.balances.available, dec!(0.00));

    let mut conn = engine.db().pg.acquire().await.unwrap();
    let payment = PaymentRepo::find_by_booking(&mut conn, booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status().unwrap(), PaymentStatus::Refunded);
    assert_eq!(payment.refunded_amount, dec!(850.00));
    let rows = WalletRepo::list_by_payment(&mut conn, payment.id).await.unwrap();
    assert!(rows.iter().all(|r| r.tx_type != "payment_received" || r.balance_kind == "pending"));

    let again = engine
        .disputes
        .resolve(
            admin,
            booking.id,
            ResolveDispute {
                resolution: "Second try".into(),
                favor: DisputeFavor::Provider,
                refund_percentage: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(again, CoreError::Domain(DomainError::Conflict(_))));

    let audit = engine.disputes.audit_log(admin, booking.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].automatic);
}

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_partial_refund_splits_escrow() {
    let engine = engine().await;
    let client = seed_user(&engine, Role::Client).await;
    let provider = seed_user(&engine, Role::Provider).await;
    let admin = seed_user(&engine, Role::Admin).await;
    let booking = completed_paid_booking(&engine, client, provider, 5).await;
    engine.bookings.confirm(client, booking.id, dispute()).await.unwrap();

    let resolved = engine
        .disputes
        .resolve(
            admin,
            booking.id,
            ResolveDispute {
                resolution: "Half the work was done".into(),
                favor: DisputeFavor::Provider,
                refund_percentage: Some(dec!(50)),
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status().unwrap(), BookingStatus::Completed);

    let wallet = engine.wallets.summary(provider).await.unwrap();
    assert_eq!(wallet.balances.pending, dec!(0.00));
    assert_eq!(wallet.balances.available, dec!(425.00));

    let booking = engine.bookings.get(admin, booking.id).await.unwrap();
    assert_eq!(
        booking.payment_status().unwrap(),
        Some(PaymentStatus::PartiallyRefunded)
    );
}

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_stale_dispute_resolves_for_provider() {
    let engine = engine().await;
    let client = seed_user(&engine, Role::Client).await;
    let provider = seed_user(&engine, Role::Provider).await;
    let booking = completed_paid_booking(&engine, client, provider, 6).await;
    engine.bookings.confirm(client, booking.id, dispute()).await.unwrap();

    // Not due yet
    assert!(!engine
        .disputes
        .auto_resolve(booking.id, Utc::now() + Duration::days(6))
        .await
        .unwrap());

    assert!(engine
        .disputes
        .auto_resolve(booking.id, Utc::now() + Duration::days(8))
        .await
        .unwrap());

    let booking = engine.bookings.get(client, booking.id).await.unwrap();
    assert_eq!(booking.status().unwrap(), BookingStatus::Completed);
    assert!(booking.dispute_resolved_by.is_none());

    let wallet = engine.wallets.summary(provider).await.unwrap();
    assert_eq!(wallet.balances.pending, Decimal::ZERO);
    assert_eq!(wallet.balances.available, dec!(850.00));
}
