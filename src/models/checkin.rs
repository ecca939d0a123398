use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "checkin_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    Pending,
    CheckedIn,
    CheckedOut,
}

impl CheckInStatus {
    /// An active presence is any record that has not been checked out.
    pub fn is_active(&self) -> bool {
        !matches!(self, CheckInStatus::CheckedOut)
    }

    /// Verification accepts a fresh token and, intentionally, a checked-out
    /// record re-presenting its token on re-entry.
    pub fn accepts_verification(&self) -> bool {
        matches!(self, CheckInStatus::Pending | CheckInStatus::CheckedOut)
    }
}

/// Who holds the presence record. Exactly one of subject or visitor, by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PresenceHolder {
    Subject(Uuid),
    Visitor(Uuid),
}

impl PresenceHolder {
    pub fn subject_id(&self) -> Option<Uuid> {
        match self {
            PresenceHolder::Subject(id) => Some(*id),
            PresenceHolder::Visitor(_) => None,
        }
    }

    pub fn visitor_id(&self) -> Option<Uuid> {
        match self {
            PresenceHolder::Subject(_) => None,
            PresenceHolder::Visitor(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub checkin_id: Uuid,
    pub holder: PresenceHolder,
    pub building_id: Option<Uuid>,
    pub floor: String,
    pub block: String,
    pub laptop_model: Option<String>,
    pub laptop_asset_number: Option<String>,
    pub check_in_time: OffsetDateTime,
    pub check_out_time: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
    pub officer_id: Option<Uuid>,
    pub status: CheckInStatus,
    pub qr_payload: String,
}

impl CheckIn {
    pub fn snapshot(&self) -> CheckInSnapshot {
        CheckInSnapshot {
            checkin_id: self.checkin_id,
            status: self.status,
            user_id: self.holder.subject_id(),
            visitor_id: self.holder.visitor_id(),
            floor: self.floor.clone(),
            block: self.block.clone(),
            laptop_model: self.laptop_model.clone(),
            laptop_asset_number: self.laptop_asset_number.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Link from a check-in to the booking it fulfills. Written only at check-in
/// time, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCheckIn {
    pub booking_id: Uuid,
    pub checkin_id: Uuid,
}

/// Creation input handed to the check-in store.
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub checkin_id: Uuid,
    pub holder: PresenceHolder,
    pub building_id: Option<Uuid>,
    pub floor: String,
    pub block: String,
    pub laptop_model: Option<String>,
    pub laptop_asset_number: Option<String>,
    pub check_in_time: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub qr_payload: String,
}

#[derive(Deserialize)]
pub struct CreateCheckInReq {
    pub subject_id: Uuid,
    pub building_id: Option<Uuid>,
    pub floor: String,
    pub block: String,
    pub laptop_model: Option<String>,
    pub laptop_asset_number: Option<String>,
    pub booking_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct CheckoutReq {
    pub checkin_id: Uuid,
}

#[derive(Deserialize)]
pub struct VerifyQrReq {
    pub checkin_id: Uuid,
    pub officer_id: Uuid,
}

/// Read-only projection served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInSnapshot {
    pub checkin_id: Uuid,
    pub status: CheckInStatus,
    pub user_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    pub floor: String,
    pub block: String,
    pub laptop_model: Option<String>,
    pub laptop_asset_number: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckInFilter {
    pub user_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub floor: Option<String>,
    pub block: Option<String>,
    pub status: Option<CheckInStatus>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}
