use std::sync::Arc;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::models::booking::{Booking, BookingFilter, BookingPatch, NewBooking};
use crate::models::checkin::{CheckIn, CheckInFilter, NewCheckIn, PresenceHolder};
use crate::models::space::{Space, SpaceKind};
use crate::models::user::{ProfileUpdate, Subject};
use crate::utils::errorhandler::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Space resolution, owned by the building-management subsystem.
#[async_trait]
pub trait SpaceCatalog: Send + Sync {
    async fn find_by_building_and_kind(
        &self,
        building_id: Uuid,
        kind: SpaceKind,
    ) -> AppResult<Option<Space>>;
}

/// Account resolution and the self-service profile write path.
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    async fn find_subject(&self, user_id: Uuid) -> AppResult<Option<Subject>>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<Subject>;
}

/// Booking persistence. `admit` and `update` run their overlap check and the
/// write as one decision, so two racing requests cannot both pass.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn admit(&self, new: NewBooking) -> AppResult<Booking>;

    async fn find(&self, booking_id: Uuid) -> AppResult<Option<Booking>>;

    async fn update(&self, booking_id: Uuid, patch: BookingPatch) -> AppResult<Booking>;

    async fn delete(&self, booking_id: Uuid) -> AppResult<()>;

    /// Bookings on (space, date) whose status blocks admission.
    async fn active_on(&self, space_id: Uuid, date: Date) -> AppResult<Vec<Booking>>;

    async fn list(&self, filter: BookingFilter) -> AppResult<Vec<Booking>>;
}

/// Check-in persistence. The three mutating calls each run their lifecycle
/// checks and the transition as one decision.
#[async_trait]
pub trait CheckInStore: Send + Sync {
    async fn create(&self, new: NewCheckIn, booking_id: Option<Uuid>) -> AppResult<CheckIn>;

    async fn verify(
        &self,
        checkin_id: Uuid,
        officer_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<CheckIn>;

    async fn checkout(
        &self,
        checkin_id: Uuid,
        officer_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<CheckIn>;

    async fn find(&self, checkin_id: Uuid) -> AppResult<Option<CheckIn>>;

    async fn list(&self, filter: CheckInFilter) -> AppResult<Vec<CheckIn>>;

    async fn find_for_holder(&self, holder: PresenceHolder) -> AppResult<Vec<CheckIn>>;
}

/// Store handles handed to the services at startup. Replaces the global pool
/// the handlers used to share.
#[derive(Clone)]
pub struct Store {
    pub spaces: Arc<dyn SpaceCatalog>,
    pub subjects: Arc<dyn SubjectDirectory>,
    pub bookings: Arc<dyn BookingStore>,
    pub checkins: Arc<dyn CheckInStore>,
}

impl Store {
    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Store {
            spaces: store.clone(),
            subjects: store.clone(),
            bookings: store.clone(),
            checkins: store,
        }
    }

    pub async fn postgres(database_url: &str) -> AppResult<Self> {
        let store = Arc::new(PgStore::connect(database_url).await?);
        Ok(Store {
            spaces: store.clone(),
            subjects: store.clone(),
            bookings: store.clone(),
            checkins: store,
        })
    }
}
