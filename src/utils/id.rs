use uuid::Uuid;

/// Generate a fresh record identifier.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// True when `id` is absent or blank and must be replaced with a generated one.
pub fn needs_id(id: &str) -> bool {
    id.trim().is_empty()
}
