use std::sync::Arc;

use time::Duration;
use time::macros::{date, datetime, time};
use uuid::Uuid;

use workplace_access_api::models::booking::{BookingStatus, TimeSlot};
use workplace_access_api::models::checkin::{CheckInStatus, CreateCheckInReq};
use workplace_access_api::models::space::{Space, SpaceKind};
use workplace_access_api::models::user::Subject;
use workplace_access_api::service::checkin::CheckInStateMachine;
use workplace_access_api::service::scheduler::BookingScheduler;
use workplace_access_api::service::verify::QrTokenVerifier;
use workplace_access_api::store::{MemoryStore, Store};
use workplace_access_api::utils::clock::{Clock, ManualClock};
use workplace_access_api::utils::errorhandler::AppError;

struct Harness {
    mem: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    scheduler: BookingScheduler,
    checkins: CheckInStateMachine,
    verifier: QrTokenVerifier,
    building_id: Uuid,
}

async fn harness() -> Harness {
    let mem = Arc::new(MemoryStore::new());
    let building_id = Uuid::new_v4();
    mem.seed_space(Space {
        space_id: Uuid::new_v4(),
        building_id,
        name: "desk-A".into(),
        kind: SpaceKind::Desk,
        capacity: 4,
        created_at: datetime!(2025-01-01 00:00 UTC),
    })
    .await
    .unwrap();

    let clock = Arc::new(ManualClock::new(datetime!(2025-01-10 08:00 UTC)));
    let store = Store::from_memory(mem.clone());
    Harness {
        mem,
        scheduler: BookingScheduler::new(store.clone(), clock.clone()),
        checkins: CheckInStateMachine::new(store.clone(), clock.clone()),
        verifier: QrTokenVerifier::new(store, clock.clone()),
        clock,
        building_id,
    }
}

async fn seed_subject(h: &Harness, name: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    h.mem
        .seed_subject(Subject {
            user_id,
            email: format!("{name}@example.com"),
            first_name: name.into(),
            last_name: "Dlamini".into(),
            phone: None,
            building_id: Some(h.building_id),
            laptop_model: Some("XPS 13".into()),
            laptop_asset_number: Some("A-2207".into()),
            photo_url: None,
            is_active: true,
            created_at: datetime!(2025-01-01 00:00 UTC),
        })
        .await;
    user_id
}

fn checkin_request(subject_id: Uuid, booking_id: Option<Uuid>) -> CreateCheckInReq {
    CreateCheckInReq {
        subject_id,
        building_id: None,
        floor: "3".into(),
        block: "North".into(),
        laptop_model: Some("XPS 13".into()),
        laptop_asset_number: Some("A-2207".into()),
        booking_id,
    }
}

#[tokio::test]
async fn presence_lifecycle_from_checkin_to_reentry() {
    let h = harness().await;
    let u1 = seed_subject(&h, "u1").await;
    let o1 = Uuid::new_v4();

    // T0: check in, token issued
    let checkin = h.checkins.create_checkin(checkin_request(u1, None)).await.unwrap();
    assert_eq!(checkin.status, CheckInStatus::Pending);

    // T0+5m: officer verifies the presented token
    h.clock.advance(Duration::minutes(5));
    let verified = h.verifier.verify(checkin.checkin_id, o1).await.unwrap();
    assert_eq!(verified.status, CheckInStatus::CheckedIn);
    assert_eq!(verified.officer_id, Some(o1));

    // while present, a second presence record is refused
    let err = h
        .checkins
        .create_checkin(checkin_request(u1, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // T0+1h: officer checks the subject out
    h.clock.advance(Duration::minutes(55));
    let done = h.checkins.checkout(checkin.checkin_id, o1).await.unwrap();
    assert_eq!(done.status, CheckInStatus::CheckedOut);
    assert_eq!(done.check_out_time, Some(h.clock.now()));
    assert_eq!(done.officer_id, Some(o1));

    // T0+1h+1m: no active presence remains, a fresh check-in succeeds
    h.clock.advance(Duration::minutes(1));
    let second = h.checkins.create_checkin(checkin_request(u1, None)).await.unwrap();
    assert_eq!(second.status, CheckInStatus::Pending);
    assert_ne!(second.checkin_id, checkin.checkin_id);
}

#[tokio::test]
async fn desk_booking_admission_scenario() {
    let h = harness().await;
    let u2 = seed_subject(&h, "u2").await;
    let day = date!(2025 - 01 - 10);

    h.scheduler
        .create_booking(
            u2,
            h.building_id,
            SpaceKind::Desk,
            day,
            TimeSlot::new(time!(9:00), time!(10:00)).unwrap(),
        )
        .await
        .unwrap();

    let err = h
        .scheduler
        .create_booking(
            Uuid::new_v4(),
            h.building_id,
            SpaceKind::Desk,
            day,
            TimeSlot::new(time!(9:30), time!(10:30)).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let third = h
        .scheduler
        .create_booking(
            Uuid::new_v4(),
            h.building_id,
            SpaceKind::Desk,
            day,
            TimeSlot::new(time!(10:00), time!(11:00)).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(third.status, BookingStatus::Pending);

    // the availability probe agrees with admission
    let probe = h
        .scheduler
        .check_availability(
            h.building_id,
            SpaceKind::Desk,
            day,
            TimeSlot::new(time!(9:00), time!(11:00)).unwrap(),
        )
        .await
        .unwrap();
    assert!(!probe.available);

    let free = h
        .scheduler
        .check_availability(
            h.building_id,
            SpaceKind::Desk,
            day,
            TimeSlot::new(time!(11:00), time!(12:00)).unwrap(),
        )
        .await
        .unwrap();
    assert!(free.available);
    assert!(free.space_id.is_some());
}

#[tokio::test]
async fn booking_fulfilled_by_a_linked_checkin() {
    let h = harness().await;
    let u3 = seed_subject(&h, "u3").await;
    let o1 = Uuid::new_v4();

    let booking = h
        .scheduler
        .create_booking(
            u3,
            h.building_id,
            SpaceKind::Desk,
            date!(2025 - 01 - 10),
            TimeSlot::new(time!(9:00), time!(17:00)).unwrap(),
        )
        .await
        .unwrap();

    let checkin = h
        .checkins
        .create_checkin(checkin_request(u3, Some(booking.booking_id)))
        .await
        .unwrap();

    let links = h.mem.booking_links(checkin.checkin_id).await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].booking_id, booking.booking_id);

    h.verifier.verify(checkin.checkin_id, o1).await.unwrap();
    h.clock.advance(Duration::hours(8));
    let done = h.checkins.checkout(checkin.checkin_id, o1).await.unwrap();
    assert_eq!(done.status, CheckInStatus::CheckedOut);

    // deleting the booking later does not disturb the presence history
    h.scheduler.delete_booking(booking.booking_id).await.unwrap();
    let history = h.checkins.my_checkins(u3).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, CheckInStatus::CheckedOut);
}

#[tokio::test]
async fn racing_overlapping_bookings_admit_exactly_one() {
    let h = harness().await;
    let day = date!(2025 - 01 - 10);

    let (a, b) = tokio::join!(
        h.scheduler.create_booking(
            Uuid::new_v4(),
            h.building_id,
            SpaceKind::Desk,
            day,
            TimeSlot::new(time!(9:00), time!(10:00)).unwrap(),
        ),
        h.scheduler.create_booking(
            Uuid::new_v4(),
            h.building_id,
            SpaceKind::Desk,
            day,
            TimeSlot::new(time!(9:30), time!(10:30)).unwrap(),
        ),
    );
    assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
}

#[tokio::test]
async fn racing_checkin_creations_admit_exactly_one() {
    let h = harness().await;
    let u5 = seed_subject(&h, "u5").await;

    let (a, b) = tokio::join!(
        h.checkins.create_checkin(checkin_request(u5, None)),
        h.checkins.create_checkin(checkin_request(u5, None)),
    );
    assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
}

#[tokio::test]
async fn racing_verifications_of_a_pending_token_admit_exactly_one() {
    let h = harness().await;
    let u6 = seed_subject(&h, "u6").await;

    let checkin = h.checkins.create_checkin(checkin_request(u6, None)).await.unwrap();

    let (a, b) = tokio::join!(
        h.verifier.verify(checkin.checkin_id, Uuid::new_v4()),
        h.verifier.verify(checkin.checkin_id, Uuid::new_v4()),
    );
    assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
}

#[tokio::test]
async fn reentry_restores_active_presence() {
    let h = harness().await;
    let u4 = seed_subject(&h, "u4").await;
    let o1 = Uuid::new_v4();

    let checkin = h.checkins.create_checkin(checkin_request(u4, None)).await.unwrap();
    h.verifier.verify(checkin.checkin_id, o1).await.unwrap();
    h.clock.advance(Duration::hours(1));
    h.checkins.checkout(checkin.checkin_id, o1).await.unwrap();

    // the same token re-enters the building
    let back = h.verifier.verify(checkin.checkin_id, o1).await.unwrap();
    assert_eq!(back.status, CheckInStatus::CheckedIn);

    // the record is an active presence again, so a new check-in is refused
    let err = h
        .checkins
        .create_checkin(checkin_request(u4, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
