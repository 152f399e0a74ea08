use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events pushed to operator dashboards over the live stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum LiveEvent {
    /// A refresh replaced the guest snapshot of an event
    SnapshotRefreshed {
        event_id: String,
        registered_count: usize,
        truncated: bool,
        fetched_at: DateTime<Utc>,
    },

    /// A refresh failed; the previous snapshot is still served
    RefreshFailed {
        event_id: String,
        error: String,
        at: DateTime<Utc>,
    },

    /// A guest was checked in
    GuestVerified {
        event_id: String,
        day: String,
        email: String,
        verified_at: DateTime<Utc>,
    },
}

impl LiveEvent {
    pub fn event_id(&self) -> &str {
        match self {
            Self::SnapshotRefreshed { event_id, .. }
            | Self::RefreshFailed { event_id, .. }
            | Self::GuestVerified { event_id, .. } => event_id,
        }
    }

    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SnapshotRefreshed { .. } => "snapshot_refreshed",
            Self::RefreshFailed { .. } => "refresh_failed",
            Self::GuestVerified { .. } => "guest_verified",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = LiveEvent::RefreshFailed {
            event_id: "ev1".into(),
            error: "boom".into(),
            at: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "RefreshFailed");
        assert_eq!(value["data"]["eventId"], "ev1");
        assert_eq!(event.kind(), "refresh_failed");
    }
}
