use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::models::space::SpaceKind;
use crate::utils::errorhandler::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Statuses that block admission of an overlapping booking.
    pub fn blocks_admission(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

/// Half-open interval [start, end) within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: Time,
    pub end: Time,
}

impl TimeSlot {
    pub fn new(start: Time, end: Time) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::validation("Invalid timings"));
        }
        Ok(TimeSlot { start, end })
    }

    /// Strict open-interval overlap test. Equal boundaries do not overlap,
    /// so back-to-back slots are both admissible.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

pub fn parse_date(s: &str) -> AppResult<Date> {
    let fmt = format_description!("[year]-[month]-[day]");
    Date::parse(s, &fmt).map_err(|_| AppError::validation(format!("invalid date: {s}")))
}

pub fn parse_time(s: &str) -> AppResult<Time> {
    let hm = format_description!("[hour]:[minute]");
    let hms = format_description!("[hour]:[minute]:[second]");
    Time::parse(s, &hm)
        .or_else(|_| Time::parse(s, &hms))
        .map_err(|_| AppError::validation(format!("invalid time: {s}")))
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub booking_id: Uuid,
    pub subject_id: Uuid,
    pub space_id: Uuid,
    pub booking_date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub status: BookingStatus,
    pub created_at: OffsetDateTime,
}

impl Booking {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Admission input handed to the booking store.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub subject_id: Uuid,
    pub space_id: Uuid,
    pub booking_date: Date,
    pub slot: TimeSlot,
    pub created_at: OffsetDateTime,
}

/// Full overwrite applied by UpdateBooking after the space re-resolves.
#[derive(Debug, Clone)]
pub struct BookingPatch {
    pub subject_id: Uuid,
    pub space_id: Uuid,
    pub booking_date: Date,
    pub slot: TimeSlot,
}

#[derive(Deserialize)]
pub struct CreateBookingReq {
    pub subject_id: Uuid,
    pub building_id: Uuid,
    pub floor: Option<String>,
    pub kind: SpaceKind,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Deserialize)]
pub struct AvailabilityParams {
    pub building_id: Uuid,
    pub kind: SpaceKind,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub subject_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub kind: Option<SpaceKind>,
    pub booking_date: Option<Date>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    fn slot(start: Time, end: Time) -> TimeSlot {
        TimeSlot { start, end }
    }

    #[test]
    fn equal_boundaries_do_not_overlap() {
        let morning = slot(time!(9:00), time!(10:00));
        let next = slot(time!(10:00), time!(11:00));
        assert!(!morning.overlaps(&next));
        assert!(!next.overlaps(&morning));
    }

    #[test]
    fn contained_and_straddling_intervals_overlap() {
        let long = slot(time!(9:00), time!(12:00));
        let inner = slot(time!(10:00), time!(11:00));
        let straddle = slot(time!(11:30), time!(13:00));
        assert!(long.overlaps(&inner));
        assert!(inner.overlaps(&long));
        assert!(long.overlaps(&straddle));
    }

    #[test]
    fn slot_rejects_empty_and_reversed_intervals() {
        assert!(TimeSlot::new(time!(10:00), time!(10:00)).is_err());
        assert!(TimeSlot::new(time!(11:00), time!(10:00)).is_err());
        assert!(TimeSlot::new(time!(10:00), time!(10:01)).is_ok());
    }

    #[test]
    fn parses_wire_formats() {
        assert_eq!(parse_time("09:00").unwrap(), time!(9:00));
        assert_eq!(parse_time("09:30:00").unwrap(), time!(9:30));
        assert!(parse_time("9am").is_err());
        assert_eq!(parse_date("2025-01-10").unwrap(), date!(2025 - 01 - 10));
        assert!(parse_date("10/01/2025").is_err());
    }

    #[test]
    fn booking_round_trips_through_serde() {
        let booking = Booking {
            booking_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            space_id: Uuid::new_v4(),
            booking_date: date!(2025 - 01 - 10),
            start_time: time!(9:00),
            end_time: time!(10:00),
            status: BookingStatus::Confirmed,
            created_at: datetime!(2025-01-09 08:00 UTC),
        };
        let json = serde_json::to_string(&booking).unwrap();
        let back: Booking = serde_json::from_str(&json).unwrap();
        assert_eq!(back.booking_id, booking.booking_id);
        assert_eq!(back.booking_date, booking.booking_date);
        assert_eq!(back.start_time, booking.start_time);
        assert_eq!(back.end_time, booking.end_time);
        assert_eq!(back.status, booking.status);
        assert_eq!(back.created_at, booking.created_at);
    }
}
