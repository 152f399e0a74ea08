/// Database row types. These map directly to SQLite rows.
/// Distinct from rollcall-types models to keep the DB layer independent.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRow {
    pub id: String,
    pub email: String,
    pub event_id: String,
    pub day: String,
    /// RFC 3339, UTC.
    pub verified_at: String,
}
