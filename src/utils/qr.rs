use uuid::Uuid;

// The payload embeds the check-in's own identity; rendering it to a
// scannable image happens client-side.

pub fn payload_for(checkin_id: Uuid) -> String {
    checkin_id.to_string()
}

pub fn resolve(payload: &str) -> Option<Uuid> {
    Uuid::parse_str(payload.trim()).ok()
}
