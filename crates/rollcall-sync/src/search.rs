//! Read side for the operator UI. Everything here works off the engine's
//! last good snapshot and never touches the guest source.

use tracing::debug;

use rollcall_types::api::TrackerResponse;
use rollcall_types::{Guest, normalize_email};

use crate::engine::{Engine, GuestSnapshot};
use crate::error::SyncError;

/// Upper bound on typeahead results.
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Default page size of [`GuestDirectory::list`].
pub const DEFAULT_LIST_LIMIT: usize = 100;

impl GuestSnapshot {
    /// Guests whose email contains `partial`, ignoring case, in snapshot
    /// order. At most `limit` results, and never more than
    /// [`MAX_SEARCH_RESULTS`].
    pub fn search(&self, partial: &str, limit: usize) -> Vec<&Guest> {
        let needle = partial.trim().to_lowercase();
        let limit = limit.clamp(1, MAX_SEARCH_RESULTS);

        self.guests()
            .iter()
            .filter(|g| needle.is_empty() || g.email.contains(&needle))
            .take(limit)
            .collect()
    }

    /// Exact lookup, normalizing `email` first.
    pub fn find(&self, email: &str) -> Option<&Guest> {
        self.get(&normalize_email(email)?)
    }
}

#[derive(Clone)]
pub struct GuestDirectory {
    engine: Engine,
}

impl GuestDirectory {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn search(&self, event_id: &str, partial: &str, limit: Option<usize>) -> Result<Vec<Guest>, SyncError> {
        let snapshot = self.engine.snapshot(event_id)?;
        let hits: Vec<Guest> = snapshot
            .search(partial, limit.unwrap_or(MAX_SEARCH_RESULTS))
            .into_iter()
            .cloned()
            .collect();
        debug!("{}: search '{}' -> {} hits", event_id, partial, hits.len());
        Ok(hits)
    }

    /// A miss is an expected outcome and is not logged.
    pub fn find_by_email(&self, event_id: &str, email: &str) -> Result<Guest, SyncError> {
        self.engine
            .snapshot(event_id)?
            .find(email)
            .cloned()
            .ok_or_else(|| SyncError::GuestNotFound {
                event_id: event_id.to_string(),
                email: email.trim().to_lowercase(),
            })
    }

    /// One page of the full guest table plus the total count.
    pub fn list(&self, event_id: &str, offset: usize, limit: Option<usize>) -> Result<(usize, Vec<Guest>), SyncError> {
        let snapshot = self.engine.snapshot(event_id)?;
        let guests = snapshot
            .guests()
            .iter()
            .skip(offset)
            .take(limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .cloned()
            .collect();
        Ok((snapshot.len(), guests))
    }

    pub async fn tracker(&self, event_id: &str, day: &str) -> Result<TrackerResponse, SyncError> {
        Ok(self.engine.current_view(event_id, day).await?.tracker())
    }
}
