//! Integration tests for the booking lifecycle against a real Postgres.

mod common;

use crate::common::{available_seats, create_test_event, create_test_user, TestHarness};
use booking_core::common::{BookingId, EventId, UserId};
use booking_core::domains::bookings::{Booking, BookingError, BookingStatus};
use booking_core::domains::events::{max_booking_ttl, NewEvent};
use booking_core::kernel::BaseClock;
use chrono::{Duration, Utc};
use test_context::test_context;

async fn reload(ctx: &TestHarness, booking: &Booking) -> Booking {
    Booking::find_by_id(booking.id, &ctx.db_pool)
        .await
        .unwrap()
        .expect("booking exists")
}

// =============================================================================
// Reserve
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn reserve_creates_pending_booking_with_deadline(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 3, Duration::minutes(10))
        .await
        .unwrap();

    let booking = service.reserve_seat(user.id, event.id).await.unwrap();

    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.event_id, event.id);
    assert_eq!(booking.user_id, user.id);
    assert_eq!(booking.expires_at, ctx.clock.now() + Duration::minutes(10));
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reserve_on_full_event_fails_without_side_effects(ctx: &TestHarness) {
    let service = ctx.service();
    let ada = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let bob = create_test_user(&ctx.db_pool, "bob").await.unwrap();
    let event = create_test_event(&service, 1, Duration::minutes(10))
        .await
        .unwrap();

    service.reserve_seat(ada.id, event.id).await.unwrap();
    let err = service.reserve_seat(bob.id, event.id).await.unwrap_err();

    assert!(matches!(err, BookingError::NoSeatsAvailable), "{err}");
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 0);

    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE event_id = $1")
        .bind(event.id)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(bookings, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reserve_on_unknown_event_is_not_found(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();

    let err = service
        .reserve_seat(user.id, EventId::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::EventNotFound), "{err}");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reserve_for_unknown_user_keeps_the_seat(ctx: &TestHarness) {
    let service = ctx.service();
    let event = create_test_event(&service, 2, Duration::minutes(10))
        .await
        .unwrap();

    let err = service
        .reserve_seat(UserId::new(), event.id)
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::UserNotFound), "{err}");
    assert!(!err.is_retryable());
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 2);
    assert!(service.audit_seats().await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn event_created_sold_out_rejects_reservations(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = service
        .create_event(
            NewEvent::builder()
                .title("Sold out")
                .date(Utc::now() + Duration::days(1))
                .total_seats(5)
                .available_seats(0)
                .build(),
        )
        .await
        .unwrap();

    let err = service.reserve_seat(user.id, event.id).await.unwrap_err();
    assert!(matches!(err, BookingError::NoSeatsAvailable), "{err}");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn invalid_event_is_rejected_before_storage(ctx: &TestHarness) {
    let service = ctx.service();
    let err = service
        .create_event(
            NewEvent::builder()
                .title("Too many")
                .date(Utc::now())
                .total_seats(2)
                .available_seats(3)
                .build(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::InvalidEvent(_)), "{err}");
    assert!(service.list_events(10, 0).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reservation_window_beyond_a_year_is_rejected(ctx: &TestHarness) {
    let service = ctx.service();
    let err = service
        .create_event(
            NewEvent::builder()
                .title("Forever")
                .date(Utc::now() + Duration::days(1))
                .total_seats(5)
                .booking_ttl(Duration::seconds(9_000_000_000_000_000))
                .build(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::InvalidEvent(_)), "{err}");
    assert!(service.list_events(10, 0).await.unwrap().is_empty());

    // The longest allowed window still produces a usable deadline
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 1, max_booking_ttl())
        .await
        .unwrap();
    let booking = service.reserve_seat(user.id, event.id).await.unwrap();
    assert_eq!(booking.expires_at, ctx.clock.now() + max_booking_ttl());
}

// =============================================================================
// Confirm
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn confirm_keeps_the_seat(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 2, Duration::minutes(10))
        .await
        .unwrap();
    let booking = service.reserve_seat(user.id, event.id).await.unwrap();

    let confirmed = service
        .confirm_booking(user.id, event.id, booking.id)
        .await
        .unwrap();

    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn confirm_requires_owner_event_and_pending(ctx: &TestHarness) {
    let service = ctx.service();
    let ada = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let mallory = create_test_user(&ctx.db_pool, "mallory").await.unwrap();
    let event = create_test_event(&service, 2, Duration::minutes(10))
        .await
        .unwrap();
    let other_event = create_test_event(&service, 2, Duration::minutes(10))
        .await
        .unwrap();
    let booking = service.reserve_seat(ada.id, event.id).await.unwrap();

    for (user_id, event_id, booking_id) in [
        (mallory.id, event.id, booking.id),
        (ada.id, other_event.id, booking.id),
        (ada.id, event.id, BookingId::new()),
    ] {
        let err = service
            .confirm_booking(user_id, event_id, booking_id)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::BookingNotConfirmable), "{err}");
    }

    assert_eq!(reload(ctx, &booking).await.status, BookingStatus::Pending);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn confirm_twice_fails_the_second_time(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 2, Duration::minutes(10))
        .await
        .unwrap();
    let booking = service.reserve_seat(user.id, event.id).await.unwrap();

    service
        .confirm_booking(user.id, event.id, booking.id)
        .await
        .unwrap();
    let err = service
        .confirm_booking(user.id, event.id, booking.id)
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::BookingNotConfirmable), "{err}");
}

// =============================================================================
// Cancel
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_before_deadline_releases_the_seat(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 1, Duration::minutes(10))
        .await
        .unwrap();
    let booking = service.reserve_seat(user.id, event.id).await.unwrap();

    ctx.clock.advance(Duration::minutes(9));
    let cancelled = service
        .cancel_booking(user.id, event.id, booking.id)
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_after_deadline_is_rejected(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 1, Duration::minutes(10))
        .await
        .unwrap();
    let booking = service.reserve_seat(user.id, event.id).await.unwrap();

    ctx.clock.advance(Duration::minutes(11));
    let err = service
        .cancel_booking(user.id, event.id, booking.id)
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::BookingNotCancellable), "{err}");
    assert_eq!(reload(ctx, &booking).await.status, BookingStatus::Pending);
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_exactly_at_deadline_is_rejected(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 1, Duration::minutes(10))
        .await
        .unwrap();
    let booking = service.reserve_seat(user.id, event.id).await.unwrap();

    ctx.clock.set(booking.expires_at);
    let err = service
        .cancel_booking(user.id, event.id, booking.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BookingNotCancellable), "{err}");

    // Neither cancellable nor yet expired at the exact deadline
    let report = service.run_reconciliation().await.unwrap();
    assert_eq!(report.expired, 0);
    assert_eq!(reload(ctx, &booking).await.status, BookingStatus::Pending);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_by_another_user_is_rejected(ctx: &TestHarness) {
    let service = ctx.service();
    let ada = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let mallory = create_test_user(&ctx.db_pool, "mallory").await.unwrap();
    let event = create_test_event(&service, 1, Duration::minutes(10))
        .await
        .unwrap();
    let booking = service.reserve_seat(ada.id, event.id).await.unwrap();

    let err = service
        .cancel_booking(mallory.id, event.id, booking.id)
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::BookingNotCancellable), "{err}");
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 0);
}

// =============================================================================
// Terminal states
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn terminal_bookings_never_change_again(ctx: &TestHarness) {
    let service = ctx.service();
    let user = create_test_user(&ctx.db_pool, "ada").await.unwrap();
    let event = create_test_event(&service, 3, Duration::minutes(10))
        .await
        .unwrap();

    let confirmed = service.reserve_seat(user.id, event.id).await.unwrap();
    service
        .confirm_booking(user.id, event.id, confirmed.id)
        .await
        .unwrap();

    let cancelled = service.reserve_seat(user.id, event.id).await.unwrap();
    service
        .cancel_booking(user.id, event.id, cancelled.id)
        .await
        .unwrap();

    let expired = service.reserve_seat(user.id, event.id).await.unwrap();
    ctx.clock.advance(Duration::minutes(11));
    service.run_reconciliation().await.unwrap();

    // Back before every deadline: only the status guard can refuse now
    ctx.clock.advance(Duration::minutes(-11));
    let seats_before = available_seats(&ctx.db_pool, &event).await.unwrap();

    for (booking, status) in [
        (&confirmed, BookingStatus::Confirmed),
        (&cancelled, BookingStatus::Cancelled),
        (&expired, BookingStatus::Expired),
    ] {
        assert!(service
            .confirm_booking(user.id, event.id, booking.id)
            .await
            .is_err());
        assert!(service
            .cancel_booking(user.id, event.id, booking.id)
            .await
            .is_err());
        assert_eq!(reload(ctx, booking).await.status, status);
    }

    ctx.clock.advance(Duration::hours(1));
    assert_eq!(service.run_reconciliation().await.unwrap().expired, 0);
    assert_eq!(
        available_seats(&ctx.db_pool, &event).await.unwrap(),
        seats_before
    );
    assert!(service.audit_seats().await.unwrap().is_empty());
}

// =============================================================================
// Scenario
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn single_seat_passes_from_one_user_to_another(ctx: &TestHarness) {
    let service = ctx.service();
    let alice = create_test_user(&ctx.db_pool, "alice").await.unwrap();
    let bob = create_test_user(&ctx.db_pool, "bob").await.unwrap();
    let event = create_test_event(&service, 1, Duration::minutes(10))
        .await
        .unwrap();

    let alice_booking = service.reserve_seat(alice.id, event.id).await.unwrap();
    assert!(matches!(
        service.reserve_seat(bob.id, event.id).await,
        Err(BookingError::NoSeatsAvailable)
    ));

    service
        .cancel_booking(alice.id, event.id, alice_booking.id)
        .await
        .unwrap();

    let bob_booking = service.reserve_seat(bob.id, event.id).await.unwrap();
    assert_eq!(bob_booking.status, BookingStatus::Pending);
    assert_eq!(available_seats(&ctx.db_pool, &event).await.unwrap(), 0);
    assert!(service.audit_seats().await.unwrap().is_empty());
}

// =============================================================================
// Reads
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn events_are_listed_by_date(ctx: &TestHarness) {
    let service = ctx.service();
    let later = create_test_event(&service, 1, Duration::minutes(5))
        .await
        .unwrap();
    let sooner = service
        .create_event(
            NewEvent::builder()
                .title("Sooner")
                .date(Utc::now() + Duration::days(1))
                .total_seats(1)
                .build(),
        )
        .await
        .unwrap();

    let events = service.list_events(10, 0).await.unwrap();
    let ids: Vec<_> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![sooner.id, later.id]);

    let page = service.list_events(1, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, later.id);

    assert_eq!(service.get_event(sooner.id).await.unwrap().title, "Sooner");
    assert!(matches!(
        service.get_event(EventId::new()).await,
        Err(BookingError::EventNotFound)
    ));
}
