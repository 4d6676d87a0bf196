//! Booking → payment → completion → confirmation against a real database

mod common;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use servicebook_core::{
    CompleteBooking, ConfirmBooking, CoreError, CreateBooking, EvidenceInput, Page, UpdateStatus,
};
use servicebook_types::{BookingMode, BookingStatus, DomainError, EvidenceType, PaymentStatus, Role};

use common::{engine, seed_service, seed_user};

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_request_booking_is_paid_completed_and_auto_confirmed() {
    let engine = engine().await;
    let client = seed_user(&engine, Role::Client).await;
    let provider = seed_user(&engine, Role::Provider).await;
    let service_id = seed_service(&engine, &provider, dec!(800), 60).await;
    let start = Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap();

    let booking = engine
        .bookings
        .create(
            client,
            CreateBooking {
                provider_id: Some(provider.user_id),
                service_id,
                start,
                end: None,
                total_price: dec!(1000),
                mode: BookingMode::Request,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(booking.status, "pending");
    assert_eq!(booking.end_time, start + Duration::hours(1));

    // Overlapping request for the same provider
    let overlap = engine
        .bookings
        .create(
            client,
            CreateBooking {
                provider_id: None,
                service_id,
                start: start + Duration::minutes(30),
                end: None,
                total_price: dec!(1000),
                mode: BookingMode::Request,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(overlap, CoreError::Domain(DomainError::Conflict(_))));

    // Adjacent slot is fine
    engine
        .bookings
        .create(
            client,
            CreateBooking {
                provider_id: None,
                service_id,
                start: start + Duration::hours(1),
                end: None,
                total_price: dec!(1000),
                mode: BookingMode::Instant,
                notes: None,
            },
        )
        .await
        .unwrap();

    engine
        .bookings
        .update_status(
            provider,
            booking.id,
            UpdateStatus {
                status: BookingStatus::Accepted,
                reason: None,
            },
        )
        .await
        .unwrap();

    let intent = engine.payments.create_intent(client, booking.id).await.unwrap();
    assert_eq!(intent.commission_amount, dec!(150.00));
    assert_eq!(intent.net_provider_amount, dec!(850.00));
    assert!(!intent.reused);

    let again = engine.payments.create_intent(client, booking.id).await.unwrap();
    assert!(again.reused);
    assert_eq!(again.payment_id, intent.payment_id);

    let payment = engine.payments.confirm(client, booking.id).await.unwrap();
    assert_eq!(payment.status().unwrap(), PaymentStatus::Succeeded);

    // Repeated confirmation credits nothing more
    engine.payments.confirm(client, booking.id).await.unwrap();
    let wallet = engine.wallets.summary(provider).await.unwrap();
    assert_eq!(wallet.balances.pending, dec!(850.00));
    assert_eq!(wallet.balances.available, dec!(0));

    let paid_again = engine.payments.create_intent(client, booking.id).await.unwrap_err();
    assert!(matches!(paid_again, CoreError::Domain(DomainError::Conflict(_))));

    let (completed, evidence) = engine
        .bookings
        .complete_with_evidence(
            provider,
            booking.id,
            CompleteBooking {
                evidence: vec![EvidenceInput {
                    evidence_type: EvidenceType::After,
                    file_url: "https://files.test/after.jpg".into(),
                    description: None,
                }],
                notes: Some("Done".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.status, "awaiting_confirmation");
    assert_eq!(evidence.len(), 1);

    let report = engine
        .reconciler
        .run_once(Utc::now() + Duration::hours(49))
        .await;
    assert!(report.auto_confirmed >= 1);

    let booking = engine.bookings.get(client, booking.id).await.unwrap();
    assert_eq!(booking.status().unwrap(), BookingStatus::Completed);
    assert!(booking.client_confirmed_at.is_none());

    let wallet = engine.wallets.summary(provider).await.unwrap();
    assert_eq!(wallet.balances.pending, dec!(0.00));
    assert_eq!(wallet.balances.available, dec!(850.00));

    // Late client confirmation cannot release twice
    let late = engine
        .bookings
        .confirm(
            client,
            booking.id,
            ConfirmBooking {
                confirmed: true,
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(late, CoreError::Domain(DomainError::InvalidTransition { .. })));

    engine.reconciler.run_once(Utc::now() + Duration::hours(72)).await;
    let wallet = engine.wallets.summary(provider).await.unwrap();
    assert_eq!(wallet.balances.available, dec!(850.00));

    let history = engine
        .wallets
        .transactions(provider, Page::new(None, None))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_cancelling_a_paid_booking_refunds_escrow() {
    let engine = engine().await;
    let client = seed_user(&engine, Role::Client).await;
    let provider = seed_user(&engine, Role::Provider).await;
    let service_id = seed_service(&engine, &provider, dec!(100), 90).await;

    let booking = engine
        .bookings
        .create(
            client,
            CreateBooking {
                provider_id: None,
                service_id,
                start: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
                end: None,
                total_price: dec!(200),
                mode: BookingMode::Instant,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(booking.status, "accepted");

    engine.payments.create_intent(client, booking.id).await.unwrap();
    engine.payments.confirm(client, booking.id).await.unwrap();
    assert_eq!(
        engine.wallets.summary(provider).await.unwrap().balances.pending,
        dec!(170.00)
    );

    let cancelled = engine
        .bookings
        .cancel(client, booking.id, Some("plans changed"))
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");

    let wallet = engine.wallets.summary(provider).await.unwrap();
    assert_eq!(wallet.balances.pending, dec!(0.00));
    assert_eq!(wallet.balances.available, dec!(0.00));

    let booking = engine.bookings.get(provider, booking.id).await.unwrap();
    assert_eq!(booking.payment_status().unwrap(), Some(PaymentStatus::Refunded));

    // Slot is free again
    engine
        .bookings
        .create(
            client,
            CreateBooking {
                provider_id: None,
                service_id,
                start: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
                end: None,
                total_price: dec!(200),
                mode: BookingMode::Request,
                notes: None,
            },
        )
        .await
        .unwrap();
}
