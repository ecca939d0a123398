use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account record owned by the registration subsystem; resolved here for
/// check-in and profile operations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub building_id: Option<Uuid>,
    pub laptop_model: Option<String>,
    pub laptop_asset_number: Option<String>,
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// Self-service profile update. Only these fields are settable by a
/// non-admin; identity, credentials and role are not representable here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub laptop_model: Option<String>,
    pub laptop_asset_number: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.laptop_model.is_none()
            && self.laptop_asset_number.is_none()
            && self.photo_url.is_none()
    }
}
