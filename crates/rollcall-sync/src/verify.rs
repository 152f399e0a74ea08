//! Check-in workflow: validate, persist once, report.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use rollcall_types::events::LiveEvent;
use rollcall_types::{VerificationRecord, normalize_email, today_key};

use crate::engine::Engine;
use crate::error::{SyncError, VerifyError};

/// Outcome of a successful check-in.
#[derive(Debug, Clone)]
pub struct Verification {
    pub record: VerificationRecord,
    /// The email was in the event's guest snapshot at check-in time.
    pub listed: bool,
}

/// Whether an email is checked in for an event on a day.
#[derive(Debug, Clone)]
pub struct VerificationStatus {
    pub email: String,
    pub event_id: String,
    pub day: String,
    pub verified_at: Option<DateTime<Utc>>,
}

impl VerificationStatus {
    pub fn verified(&self) -> bool {
        self.verified_at.is_some()
    }
}

#[derive(Clone)]
pub struct VerificationService {
    engine: Engine,
}

impl VerificationService {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Record a check-in. Unlisted emails are still verified; the result says
    /// whether the guest was on the list.
    pub async fn verify(
        &self,
        email: &str,
        event_id: &str,
        day: Option<&str>,
    ) -> Result<Verification, VerifyError> {
        let (email, event_id, day) = validate(email, event_id, day)?;

        let record = match self.engine.store().record_verification(&email, &event_id, &day).await {
            Ok(record) => record,
            Err(e) => {
                let e = VerifyError::from(e);
                match &e {
                    VerifyError::AlreadyVerified(existing) => info!(
                        "{} already checked in to {} on {} at {}",
                        email, event_id, day, existing.verified_at
                    ),
                    other => warn!("Check-in of {} to {} failed: {}", email, event_id, other),
                }
                return Err(e);
            }
        };

        // An unregistered event has no snapshot; the check-in still stands.
        let listed = match self.engine.snapshot(&event_id) {
            Ok(snapshot) => snapshot.contains(&email),
            Err(SyncError::UnknownEvent(_)) => false,
            Err(e) => {
                warn!("Snapshot lookup for {} failed: {}", event_id, e);
                false
            }
        };

        info!(
            "Checked in {} to {} on {}{}",
            email,
            event_id,
            day,
            if listed { "" } else { " (not on guest list)" }
        );
        self.engine.publish(LiveEvent::GuestVerified {
            event_id: record.event_id.clone(),
            day: record.day.clone(),
            email: record.email.clone(),
            verified_at: record.verified_at,
        });

        Ok(Verification { record, listed })
    }

    pub async fn status(
        &self,
        email: &str,
        event_id: &str,
        day: Option<&str>,
    ) -> Result<VerificationStatus, VerifyError> {
        let (email, event_id, day) = validate(email, event_id, day)?;
        let record = self.engine.store().get_verification(&email, &event_id, &day).await?;

        Ok(VerificationStatus {
            verified_at: record.map(|r| r.verified_at),
            email,
            event_id,
            day,
        })
    }
}

/// Normalize the key parts, defaulting `day` to today (UTC).
fn validate(
    email: &str,
    event_id: &str,
    day: Option<&str>,
) -> Result<(String, String, String), VerifyError> {
    let email = normalize_email(email)
        .ok_or_else(|| VerifyError::InvalidRequest(format!("not an email address: '{}'", email.trim())))?;

    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(VerifyError::InvalidRequest("eventId is required".into()));
    }

    Ok((email, event_id.to_string(), resolve_day(day)))
}

/// Day keys are opaque, so `day-2` or `workshop` are as valid as a date.
/// Absent or blank means today's UTC date.
pub fn resolve_day(day: Option<&str>) -> String {
    day.map(str::trim)
        .filter(|d| !d.is_empty())
        .map_or_else(today_key, str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_normalizes_and_defaults_day() {
        let (email, event, day) = validate("  Ada@X.com ", " ev1 ", None).unwrap();
        assert_eq!(email, "ada@x.com");
        assert_eq!(event, "ev1");
        assert_eq!(day, today_key());
    }

    #[test]
    fn validate_rejects_bad_input() {
        assert!(matches!(validate("", "ev1", None), Err(VerifyError::InvalidRequest(_))));
        assert!(matches!(validate("nope", "ev1", None), Err(VerifyError::InvalidRequest(_))));
        assert!(matches!(validate("a@x.com", "  ", None), Err(VerifyError::InvalidRequest(_))));
    }

    #[test]
    fn day_keys_are_opaque() {
        assert_eq!(resolve_day(Some("2025-01-02")), "2025-01-02");
        assert_eq!(resolve_day(Some(" day-2 ")), "day-2");
        assert_eq!(resolve_day(Some("workshop")), "workshop");
        assert_eq!(resolve_day(Some("   ")), today_key());
        assert_eq!(resolve_day(None), today_key());
    }
}
