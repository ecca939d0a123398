use std::sync::Arc;

use uuid::Uuid;

use crate::models::checkin::CheckIn;
use crate::store::Store;
use crate::utils::clock::Clock;
use crate::utils::errorhandler::{AppError, AppResult};
use crate::utils::qr;

/// Turns a presented token into a granted physical-access state. The expiry
/// and lifecycle checks execute with the transition inside one store
/// decision, so double-presentation of the same pending token cannot both
/// succeed.
pub struct QrTokenVerifier {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl QrTokenVerifier {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        QrTokenVerifier { store, clock }
    }

    pub async fn verify(&self, checkin_id: Uuid, officer_id: Uuid) -> AppResult<CheckIn> {
        let checkin = self
            .store
            .checkins
            .verify(checkin_id, officer_id, self.clock.now())
            .await?;
        tracing::info!("check-in {checkin_id} verified by officer {officer_id}");
        Ok(checkin)
    }

    /// Same transition keyed by the raw scanned payload.
    pub async fn verify_payload(&self, payload: &str, officer_id: Uuid) -> AppResult<CheckIn> {
        let checkin_id = qr::resolve(payload)
            .ok_or_else(|| AppError::not_found("Check-in record not found"))?;
        self.verify(checkin_id, officer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::checkin::{CheckInStatus, CreateCheckInReq};
    use crate::models::user::Subject;
    use crate::service::checkin::{CheckInStateMachine, QR_TOKEN_TTL};
    use crate::store::MemoryStore;
    use crate::utils::clock::ManualClock;
    use time::macros::datetime;
    use time::Duration;

    async fn setup() -> (QrTokenVerifier, CheckInStateMachine, Arc<ManualClock>, Uuid) {
        let mem = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        mem.seed_subject(Subject {
            user_id,
            email: "u2@example.com".into(),
            first_name: "Lindiwe".into(),
            last_name: "Mokoena".into(),
            phone: None,
            building_id: None,
            laptop_model: None,
            laptop_asset_number: None,
            photo_url: None,
            is_active: true,
            created_at: datetime!(2025-01-01 00:00 UTC),
        })
        .await;
        let clock = Arc::new(ManualClock::new(datetime!(2025-01-10 08:00 UTC)));
        let store = Store::from_memory(mem);
        let verifier = QrTokenVerifier::new(store.clone(), clock.clone());
        let machine = CheckInStateMachine::new(store, clock.clone());
        (verifier, machine, clock, user_id)
    }

    fn request(subject_id: Uuid) -> CreateCheckInReq {
        CreateCheckInReq {
            subject_id,
            building_id: None,
            floor: "1".into(),
            block: "A".into(),
            laptop_model: None,
            laptop_asset_number: None,
            booking_id: None,
        }
    }

    #[tokio::test]
    async fn verification_before_expiry_checks_the_holder_in() {
        let (verifier, machine, clock, user_id) = setup().await;
        let officer = Uuid::new_v4();

        let checkin = machine.create_checkin(request(user_id)).await.unwrap();
        clock.advance(Duration::minutes(5));

        let verified = verifier.verify(checkin.checkin_id, officer).await.unwrap();
        assert_eq!(verified.status, CheckInStatus::CheckedIn);
        assert_eq!(verified.officer_id, Some(officer));
    }

    #[tokio::test]
    async fn verification_after_expiry_fails() {
        let (verifier, machine, clock, user_id) = setup().await;

        let checkin = machine.create_checkin(request(user_id)).await.unwrap();
        clock.advance(QR_TOKEN_TTL + Duration::minutes(1));

        let err = verifier
            .verify(checkin.checkin_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenExpired(_)));

        // the record never left pending
        let still = machine.get_status(checkin.checkin_id).await.unwrap();
        assert_eq!(still.status, CheckInStatus::Pending);
    }

    #[tokio::test]
    async fn verification_exactly_at_expiry_still_passes() {
        let (verifier, machine, clock, user_id) = setup().await;

        let checkin = machine.create_checkin(request(user_id)).await.unwrap();
        clock.advance(QR_TOKEN_TTL);

        // the deadline itself is not strictly past
        verifier
            .verify(checkin.checkin_id, Uuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn second_presentation_of_a_checked_in_token_is_rejected() {
        let (verifier, machine, _, user_id) = setup().await;
        let officer = Uuid::new_v4();

        let checkin = machine.create_checkin(request(user_id)).await.unwrap();
        verifier.verify(checkin.checkin_id, officer).await.unwrap();

        let err = verifier
            .verify(checkin.checkin_id, officer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn checked_out_record_re_enters_through_verification() {
        let (verifier, machine, clock, user_id) = setup().await;
        let officer = Uuid::new_v4();

        let checkin = machine.create_checkin(request(user_id)).await.unwrap();
        verifier.verify(checkin.checkin_id, officer).await.unwrap();
        clock.advance(Duration::hours(1));
        machine.checkout(checkin.checkin_id, officer).await.unwrap();

        let back = verifier.verify(checkin.checkin_id, officer).await.unwrap();
        assert_eq!(back.status, CheckInStatus::CheckedIn);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let (verifier, _, _, _) = setup().await;
        let err = verifier
            .verify(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = verifier
            .verify_payload("garbage", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn payload_resolves_to_the_same_record() {
        let (verifier, machine, _, user_id) = setup().await;
        let officer = Uuid::new_v4();

        let checkin = machine.create_checkin(request(user_id)).await.unwrap();
        let verified = verifier
            .verify_payload(&checkin.qr_payload, officer)
            .await
            .unwrap();
        assert_eq!(verified.checkin_id, checkin.checkin_id);
    }
}
