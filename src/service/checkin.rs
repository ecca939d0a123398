use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use crate::models::checkin::{
    CheckIn, CheckInFilter, CheckInSnapshot, CreateCheckInReq, NewCheckIn, PresenceHolder,
};
use crate::store::Store;
use crate::utils::clock::Clock;
use crate::utils::errorhandler::{AppError, AppResult};
use crate::utils::qr;

/// How long an issued QR token stays presentable.
pub const QR_TOKEN_TTL: Duration = Duration::hours(24);

/// Drives a presence record from creation to checkout.
pub struct CheckInStateMachine {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl CheckInStateMachine {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        CheckInStateMachine { store, clock }
    }

    /// Creates a pending record with a fresh token. The active-presence
    /// check, the insert and the optional booking link run as one decision
    /// inside the store.
    pub async fn create_checkin(&self, req: CreateCheckInReq) -> AppResult<CheckIn> {
        let subject = self
            .store
            .subjects
            .find_subject(req.subject_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let now = self.clock.now();
        let checkin_id = Uuid::new_v4();
        let checkin = self
            .store
            .checkins
            .create(
                NewCheckIn {
                    checkin_id,
                    holder: PresenceHolder::Subject(subject.user_id),
                    building_id: req.building_id,
                    floor: req.floor,
                    block: req.block,
                    laptop_model: req.laptop_model,
                    laptop_asset_number: req.laptop_asset_number,
                    check_in_time: now,
                    expires_at: Some(now + QR_TOKEN_TTL),
                    qr_payload: qr::payload_for(checkin_id),
                },
                req.booking_id,
            )
            .await?;
        tracing::info!("check-in {} created for user {}", checkin_id, subject.user_id);
        Ok(checkin)
    }

    /// Officer-submitted checkout. Legal only from CHECKED_IN.
    pub async fn checkout(&self, checkin_id: Uuid, officer_id: Uuid) -> AppResult<CheckIn> {
        let checkin = self
            .store
            .checkins
            .checkout(checkin_id, officer_id, self.clock.now())
            .await?;
        tracing::info!("check-in {checkin_id} checked out by officer {officer_id}");
        Ok(checkin)
    }

    /// Read-only projection; carries no authorization decision.
    pub async fn get_status(&self, checkin_id: Uuid) -> AppResult<CheckInSnapshot> {
        let checkin = self
            .store
            .checkins
            .find(checkin_id)
            .await?
            .ok_or_else(|| AppError::not_found("Check-in record not found"))?;
        Ok(checkin.snapshot())
    }

    pub async fn list_checkins(&self, filter: CheckInFilter) -> AppResult<Vec<CheckIn>> {
        self.store.checkins.list(filter).await
    }

    pub async fn my_checkins(&self, subject_id: Uuid) -> AppResult<Vec<CheckIn>> {
        self.store
            .checkins
            .find_for_holder(PresenceHolder::Subject(subject_id))
            .await
    }
}
