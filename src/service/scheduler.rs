use std::sync::Arc;

use time::Date;
use uuid::Uuid;

use crate::models::booking::{
    Availability, Booking, BookingFilter, BookingPatch, NewBooking, TimeSlot,
};
use crate::models::space::SpaceKind;
use crate::store::Store;
use crate::utils::clock::Clock;
use crate::utils::errorhandler::{AppError, AppResult};

/// Decides admission of new and updated bookings against the existing
/// bookings for the same space and date.
pub struct BookingScheduler {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl BookingScheduler {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        BookingScheduler { store, clock }
    }

    /// Availability probe. Pending and confirmed bookings both block.
    pub async fn check_availability(
        &self,
        building_id: Uuid,
        kind: SpaceKind,
        date: Date,
        slot: TimeSlot,
    ) -> AppResult<Availability> {
        let Some(space) = self
            .store
            .spaces
            .find_by_building_and_kind(building_id, kind)
            .await?
        else {
            return Ok(Availability {
                available: false,
                reason: Some(format!("No {} found in building.", kind.as_str())),
                space_id: None,
            });
        };

        let active = self.store.bookings.active_on(space.space_id, date).await?;
        if active.iter().any(|b| b.slot().overlaps(&slot)) {
            return Ok(Availability {
                available: false,
                reason: Some("Space is already booked for the selected time.".into()),
                space_id: None,
            });
        }

        Ok(Availability {
            available: true,
            reason: None,
            space_id: Some(space.space_id),
        })
    }

    /// Resolves the unique space for (building, kind) and admits the booking
    /// if the interval is free. The overlap check and the insert run as one
    /// decision inside the store.
    pub async fn create_booking(
        &self,
        subject_id: Uuid,
        building_id: Uuid,
        kind: SpaceKind,
        date: Date,
        slot: TimeSlot,
    ) -> AppResult<Booking> {
        let space = self
            .store
            .spaces
            .find_by_building_and_kind(building_id, kind)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No {} available in building", kind.as_str()))
            })?;

        let booking = self
            .store
            .bookings
            .admit(NewBooking {
                subject_id,
                space_id: space.space_id,
                booking_date: date,
                slot,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::info!(
            "booking {} admitted on space {} for {}",
            booking.booking_id,
            space.space_id,
            date
        );
        Ok(booking)
    }

    /// Overwrites a booking, re-resolving the space and re-running the
    /// overlap check against the new interval (its own record excluded).
    pub async fn update_booking(
        &self,
        booking_id: Uuid,
        subject_id: Uuid,
        building_id: Uuid,
        kind: SpaceKind,
        date: Date,
        slot: TimeSlot,
    ) -> AppResult<Booking> {
        self.store
            .bookings
            .find(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found("Booking not found"))?;

        let space = self
            .store
            .spaces
            .find_by_building_and_kind(building_id, kind)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No {} available in building", kind.as_str()))
            })?;

        self.store
            .bookings
            .update(
                booking_id,
                BookingPatch {
                    subject_id,
                    space_id: space.space_id,
                    booking_date: date,
                    slot,
                },
            )
            .await
    }

    /// Permanent removal. No soft delete and no cascade to check-ins.
    pub async fn delete_booking(&self, booking_id: Uuid) -> AppResult<()> {
        self.store.bookings.delete(booking_id).await
    }

    pub async fn list_bookings(&self, filter: BookingFilter) -> AppResult<Vec<Booking>> {
        self.store.bookings.list(filter).await
    }
}
