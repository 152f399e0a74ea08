use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel stored for adapter-declared attributes the provider left empty.
pub const UNKNOWN: &str = "unknown";

/// A registration record pulled from an external guest source.
///
/// Guests are immutable: a refresh replaces the whole list for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    /// Provider-scoped id. Not unique across providers.
    pub external_id: String,
    /// Normalized (trimmed, lower-cased) email, unique within one event.
    pub email: String,
    pub name: Option<String>,
    /// Provider-specific fields (role, location, ticket type, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Guest {
    /// Build a guest from a raw email. Returns `None` when the email is not
    /// usable as a key (empty or missing `@`).
    pub fn new(external_id: impl Into<String>, raw_email: &str) -> Option<Self> {
        let email = normalize_email(raw_email)?;
        Some(Self {
            external_id: external_id.into(),
            email,
            name: None,
            attributes: BTreeMap::new(),
        })
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        self
    }

    /// Set an attribute, mapping a missing or blank value to [`UNKNOWN`].
    pub fn set_attribute(&mut self, key: &str, value: Option<&str>) {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN);
        self.attributes.insert(key.to_string(), value.to_string());
    }

    pub fn attribute(&self, key: &str) -> &str {
        self.attributes.get(key).map(String::as_str).unwrap_or(UNKNOWN)
    }
}

/// A durable check-in of one guest for one event on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub id: Uuid,
    pub email: String,
    pub event_id: String,
    pub day: String,
    pub verified_at: DateTime<Utc>,
}

/// Lower-case and trim an email. `None` if the result cannot be a key.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return None;
    }
    Some(email)
}

/// Day key for "today", as a UTC calendar date (`YYYY-MM-DD`).
pub fn today_key() -> String {
    day_key(Utc::now())
}

pub fn day_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ada@Example.COM "), Some("ada@example.com".into()));
    }

    #[test]
    fn normalize_rejects_non_emails() {
        assert_eq!(normalize_email(""), None);
        assert_eq!(normalize_email("   "), None);
        assert_eq!(normalize_email("not-an-email"), None);
    }

    #[test]
    fn missing_attributes_become_unknown() {
        let mut guest = Guest::new("1", "a@x.com").unwrap();
        guest.set_attribute("role", None);
        guest.set_attribute("country", Some("  "));
        guest.set_attribute("location", Some("Lagos"));

        assert_eq!(guest.attribute("role"), UNKNOWN);
        assert_eq!(guest.attribute("country"), UNKNOWN);
        assert_eq!(guest.attribute("location"), "Lagos");
        assert_eq!(guest.attribute("never-set"), UNKNOWN);
    }

    #[test]
    fn blank_name_is_dropped() {
        let guest = Guest::new("1", "a@x.com").unwrap().with_name(Some("  "));
        assert_eq!(guest.name, None);
    }

    #[test]
    fn day_key_uses_utc_date() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 23, 59, 0).unwrap();
        assert_eq!(day_key(at), "2025-01-01");
    }
}
