use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "space_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    Desk,
    Office,
    MeetingRoom,
}

impl SpaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceKind::Desk => "desk",
            SpaceKind::Office => "office",
            SpaceKind::MeetingRoom => "meeting_room",
        }
    }
}

/// A bookable resource unit. Capacity is a quantity count, so a building
/// holds at most one space record per kind.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Space {
    pub space_id: Uuid,
    pub building_id: Uuid,
    pub name: String,
    pub kind: SpaceKind,
    pub capacity: i32,
    pub created_at: OffsetDateTime,
}
