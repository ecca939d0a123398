use std::collections::HashMap;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::booking::{
    Booking, BookingFilter, BookingPatch, BookingStatus, NewBooking, TimeSlot,
};
use crate::models::checkin::{
    BookingCheckIn, CheckIn, CheckInFilter, CheckInStatus, NewCheckIn, PresenceHolder,
};
use crate::models::space::{Space, SpaceKind};
use crate::models::user::{ProfileUpdate, Subject};
use crate::store::{BookingStore, CheckInStore, SpaceCatalog, SubjectDirectory};
use crate::utils::errorhandler::{AppError, AppResult};

/// In-process store. One mutex over the tables keeps every check-then-act
/// decision inside a single critical section.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    spaces: HashMap<Uuid, Space>,
    subjects: HashMap<Uuid, Subject>,
    bookings: HashMap<Uuid, Booking>,
    checkins: HashMap<Uuid, CheckIn>,
    booking_checkins: Vec<BookingCheckIn>,
    // creation order, for the "most recent check-in" rule
    checkin_order: Vec<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub async fn seed_subject(&self, subject: Subject) {
        let mut inner = self.inner.lock().await;
        inner.subjects.insert(subject.user_id, subject);
    }

    /// At most one space per (building, kind).
    pub async fn seed_space(&self, space: Space) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner
            .spaces
            .values()
            .any(|s| s.building_id == space.building_id && s.kind == space.kind);
        if duplicate {
            return Err(AppError::conflict(format!(
                "building already has a {} space",
                space.kind.as_str()
            )));
        }
        inner.spaces.insert(space.space_id, space);
        Ok(())
    }

    /// Insert a booking as-is, bypassing admission. Confirmed and completed
    /// rows originate in admin tooling outside this service.
    pub async fn seed_booking(&self, booking: Booking) {
        let mut inner = self.inner.lock().await;
        inner.bookings.insert(booking.booking_id, booking);
    }

    pub async fn booking_links(&self, checkin_id: Uuid) -> Vec<BookingCheckIn> {
        let inner = self.inner.lock().await;
        inner
            .booking_checkins
            .iter()
            .filter(|bc| bc.checkin_id == checkin_id)
            .copied()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn overlap_conflict(
    inner: &Inner,
    space_id: Uuid,
    date: Date,
    slot: &TimeSlot,
    exclude: Option<Uuid>,
) -> bool {
    inner.bookings.values().any(|b| {
        b.space_id == space_id
            && b.booking_date == date
            && Some(b.booking_id) != exclude
            && b.status.blocks_admission()
            && b.slot().overlaps(slot)
    })
}

#[async_trait]
impl SpaceCatalog for MemoryStore {
    async fn find_by_building_and_kind(
        &self,
        building_id: Uuid,
        kind: SpaceKind,
    ) -> AppResult<Option<Space>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .spaces
            .values()
            .find(|s| s.building_id == building_id && s.kind == kind)
            .cloned())
    }
}

#[async_trait]
impl SubjectDirectory for MemoryStore {
    async fn find_subject(&self, user_id: Uuid) -> AppResult<Option<Subject>> {
        let inner = self.inner.lock().await;
        Ok(inner.subjects.get(&user_id).cloned())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<Subject> {
        let mut inner = self.inner.lock().await;
        let subject = inner
            .subjects
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        if let Some(first_name) = update.first_name {
            subject.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            subject.last_name = last_name;
        }
        if let Some(phone) = update.phone {
            subject.phone = Some(phone);
        }
        if let Some(laptop_model) = update.laptop_model {
            subject.laptop_model = Some(laptop_model);
        }
        if let Some(laptop_asset_number) = update.laptop_asset_number {
            subject.laptop_asset_number = Some(laptop_asset_number);
        }
        if let Some(photo_url) = update.photo_url {
            subject.photo_url = Some(photo_url);
        }
        Ok(subject.clone())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn admit(&self, new: NewBooking) -> AppResult<Booking> {
        let mut inner = self.inner.lock().await;
        if overlap_conflict(&inner, new.space_id, new.booking_date, &new.slot, None) {
            return Err(AppError::conflict(
                "Space is already booked for the selected time",
            ));
        }
        let booking = Booking {
            booking_id: Uuid::new_v4(),
            subject_id: new.subject_id,
            space_id: new.space_id,
            booking_date: new.booking_date,
            start_time: new.slot.start,
            end_time: new.slot.end,
            status: BookingStatus::Pending,
            created_at: new.created_at,
        };
        inner.bookings.insert(booking.booking_id, booking.clone());
        Ok(booking)
    }

    async fn find(&self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        let inner = self.inner.lock().await;
        Ok(inner.bookings.get(&booking_id).cloned())
    }

    async fn update(&self, booking_id: Uuid, patch: BookingPatch) -> AppResult<Booking> {
        let mut inner = self.inner.lock().await;
        if !inner.bookings.contains_key(&booking_id) {
            return Err(AppError::not_found("Booking not found"));
        }
        if overlap_conflict(
            &inner,
            patch.space_id,
            patch.booking_date,
            &patch.slot,
            Some(booking_id),
        ) {
            return Err(AppError::conflict(
                "Space is already booked for the selected time",
            ));
        }
        let booking = inner
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::not_found("Booking not found"))?;
        booking.subject_id = patch.subject_id;
        booking.space_id = patch.space_id;
        booking.booking_date = patch.booking_date;
        booking.start_time = patch.slot.start;
        booking.end_time = patch.slot.end;
        Ok(booking.clone())
    }

    async fn delete(&self, booking_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .bookings
            .remove(&booking_id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Booking not found"))
    }

    async fn active_on(&self, space_id: Uuid, date: Date) -> AppResult<Vec<Booking>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bookings
            .values()
            .filter(|b| {
                b.space_id == space_id && b.booking_date == date && b.status.blocks_admission()
            })
            .cloned()
            .collect())
    }

    async fn list(&self, filter: BookingFilter) -> AppResult<Vec<Booking>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| {
                let space = inner.spaces.get(&b.space_id);
                filter.subject_id.is_none_or(|id| b.subject_id == id)
                    && filter
                        .building_id
                        .is_none_or(|id| space.is_some_and(|s| s.building_id == id))
                    && filter
                        .kind
                        .is_none_or(|kind| space.is_some_and(|s| s.kind == kind))
                    && filter.booking_date.is_none_or(|d| b.booking_date == d)
                    && filter.status.is_none_or(|st| b.status == st)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|b| (b.booking_date, b.start_time));
        Ok(rows)
    }
}

#[async_trait]
impl CheckInStore for MemoryStore {
    async fn create(&self, new: NewCheckIn, booking_id: Option<Uuid>) -> AppResult<CheckIn> {
        let mut inner = self.inner.lock().await;

        // a checked-in holder gets the specific message; the general
        // active-presence rule below would reject them anyway
        let last = inner
            .checkin_order
            .iter()
            .rev()
            .filter_map(|id| inner.checkins.get(id))
            .find(|c| c.holder == new.holder);
        if last.is_some_and(|c| c.status == CheckInStatus::CheckedIn) {
            return Err(AppError::conflict(
                "User is currently checked in and cannot check in again",
            ));
        }

        let active = inner
            .checkins
            .values()
            .any(|c| c.holder == new.holder && c.status.is_active());
        if active {
            return Err(AppError::conflict("User already has an active check-in"));
        }

        // association insert is validated first so a failure cannot leave an
        // orphaned check-in behind
        if let Some(booking_id) = booking_id {
            if !inner.bookings.contains_key(&booking_id) {
                return Err(AppError::not_found("Booking not found"));
            }
        }

        let checkin = CheckIn {
            checkin_id: new.checkin_id,
            holder: new.holder,
            building_id: new.building_id,
            floor: new.floor,
            block: new.block,
            laptop_model: new.laptop_model,
            laptop_asset_number: new.laptop_asset_number,
            check_in_time: new.check_in_time,
            check_out_time: None,
            expires_at: new.expires_at,
            officer_id: None,
            status: CheckInStatus::Pending,
            qr_payload: new.qr_payload,
        };
        inner.checkins.insert(checkin.checkin_id, checkin.clone());
        inner.checkin_order.push(checkin.checkin_id);
        if let Some(booking_id) = booking_id {
            inner.booking_checkins.push(BookingCheckIn {
                booking_id,
                checkin_id: checkin.checkin_id,
            });
        }
        Ok(checkin)
    }

    async fn verify(
        &self,
        checkin_id: Uuid,
        officer_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<CheckIn> {
        let mut inner = self.inner.lock().await;
        let checkin = inner
            .checkins
            .get_mut(&checkin_id)
            .ok_or_else(|| AppError::not_found("Check-in record not found"))?;
        if let Some(expires_at) = checkin.expires_at {
            if expires_at < now {
                return Err(AppError::token_expired("QR code has expired"));
            }
        }
        if !checkin.status.accepts_verification() {
            return Err(AppError::invalid_state(
                "Check-in is not pending or already processed",
            ));
        }
        checkin.status = CheckInStatus::CheckedIn;
        checkin.officer_id = Some(officer_id);
        Ok(checkin.clone())
    }

    async fn checkout(
        &self,
        checkin_id: Uuid,
        officer_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<CheckIn> {
        let mut inner = self.inner.lock().await;
        let checkin = inner
            .checkins
            .get_mut(&checkin_id)
            .ok_or_else(|| AppError::not_found("Check-in record not found"))?;
        if checkin.status != CheckInStatus::CheckedIn {
            return Err(AppError::invalid_state("User is not currently checked in"));
        }
        checkin.status = CheckInStatus::CheckedOut;
        checkin.check_out_time = Some(now);
        checkin.officer_id = Some(officer_id);
        Ok(checkin.clone())
    }

    async fn find(&self, checkin_id: Uuid) -> AppResult<Option<CheckIn>> {
        let inner = self.inner.lock().await;
        Ok(inner.checkins.get(&checkin_id).cloned())
    }

    async fn list(&self, filter: CheckInFilter) -> AppResult<Vec<CheckIn>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<CheckIn> = inner
            .checkins
            .values()
            .filter(|c| {
                filter
                    .user_id
                    .is_none_or(|id| c.holder.subject_id() == Some(id))
                    && filter
                        .visitor_id
                        .is_none_or(|id| c.holder.visitor_id() == Some(id))
                    && filter.building_id.is_none_or(|id| c.building_id == Some(id))
                    && filter.floor.as_deref().is_none_or(|f| c.floor == f)
                    && filter.block.as_deref().is_none_or(|b| c.block == b)
                    && filter.status.is_none_or(|st| c.status == st)
                    && filter.start_date.is_none_or(|t| c.check_in_time >= t)
                    && filter.end_date.is_none_or(|t| c.check_in_time <= t)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.check_in_time);
        Ok(rows)
    }

    async fn find_for_holder(&self, holder: PresenceHolder) -> AppResult<Vec<CheckIn>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .checkin_order
            .iter()
            .filter_map(|id| inner.checkins.get(id))
            .filter(|c| c.holder == holder)
            .cloned()
            .collect())
    }
}
