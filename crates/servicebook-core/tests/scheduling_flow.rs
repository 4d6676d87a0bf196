//! Blocked days against bookings of every length

mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use servicebook_core::{CoreError, CreateBooking, Engine};
use servicebook_types::{Actor, BookingMode, DomainError, Role};
use uuid::Uuid;

use common::{engine, seed_block, seed_service, seed_user};

fn long_stay(service_id: Uuid, end_year: i32) -> CreateBooking {
    CreateBooking {
        provider_id: None,
        service_id,
        start: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        end: Some(Utc.with_ymd_and_hms(end_year, 6, 1, 0, 0, 0).unwrap()),
        total_price: dec!(200),
        mode: BookingMode::Instant,
        notes: None,
    }
}

async fn setup(engine: &Engine) -> (Actor, Actor, Uuid) {
    let client = seed_user(engine, Role::Client).await;
    let provider = seed_user(engine, Role::Provider).await;
    let service_id = seed_service(engine, &provider, dec!(100), 60).await;
    (client, provider, service_id)
}

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_block_inside_a_long_booking_conflicts() {
    let engine = engine().await;
    let (client, provider, service_id) = setup(&engine).await;
    seed_block(&engine, &provider, NaiveDate::from_ymd_opt(2031, 2, 14).unwrap()).await;

    let err = engine
        .bookings
        .create(client, long_stay(service_id, 2045))
        .await
        .unwrap_err();
    match err {
        CoreError::Domain(DomainError::Conflict(message)) => assert!(message.contains("2031-02-14")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires test database setup"]
async fn test_block_on_the_exclusive_end_day_is_ignored() {
    let engine = engine().await;
    let (client, provider, service_id) = setup(&engine).await;
    // Ends at midnight, so the last touched day is May 31st
    seed_block(&engine, &provider, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()).await;
    seed_block(&engine, &provider, NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()).await;

    let booking = engine
        .bookings
        .create(client, long_stay(service_id, 2026))
        .await
        .unwrap();
    assert_eq!(booking.status, "accepted");
}
