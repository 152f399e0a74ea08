//! Guest list providers.
//!
//! A [`GuestSource`] is bound to one event on one provider and hands out
//! pages of already-normalized [`Guest`]s. [`fetch_all_guests`] drives the
//! cursor loop and enforces the page cap.

pub mod luma;
pub mod pager;
pub mod sheets;

use async_trait::async_trait;
use thiserror::Error;

use rollcall_types::Guest;

pub use pager::{DEFAULT_MAX_PAGES, FetchedGuests, fetch_all_guests};

/// Upstream bodies are cut to this many bytes before being kept for diagnostics.
const MAX_DIAGNOSTIC_BODY: usize = 512;

/// One page of guests plus the provider's continuation cursor.
#[derive(Debug, Clone, Default)]
pub struct GuestPage {
    pub entries: Vec<Guest>,
    pub next_cursor: Option<String>,
}

/// The guest list could not be fetched. Retried on the next refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{provider} unavailable: {detail}")]
pub struct SourceUnavailable {
    pub provider: String,
    /// Upstream HTTP status, when the provider answered at all.
    pub status: Option<u16>,
    pub detail: String,
}

impl SourceUnavailable {
    pub fn http(provider: &str, status: u16, body: &str) -> Self {
        Self {
            provider: provider.to_string(),
            status: Some(status),
            detail: format!("HTTP {}: {}", status, truncate(body)),
        }
    }

    pub fn other(provider: &str, detail: impl std::fmt::Display) -> Self {
        Self {
            provider: provider.to_string(),
            status: None,
            detail: truncate(&detail.to_string()).to_string(),
        }
    }
}

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_DIAGNOSTIC_BODY {
        return body;
    }
    let mut end = MAX_DIAGNOSTIC_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[async_trait]
pub trait GuestSource: Send + Sync {
    /// Provider name used in logs and errors, e.g. `"luma"`.
    fn provider(&self) -> &'static str;

    /// The upstream list this source reads, e.g. a Luma event id.
    fn describe(&self) -> String;

    /// Fetch one page. `cursor` is `None` for the first page.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<GuestPage, SourceUnavailable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_body_is_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        let err = SourceUnavailable::http("luma", 502, &body);
        assert_eq!(err.status, Some(502));
        assert!(err.detail.len() <= MAX_DIAGNOSTIC_BODY + "HTTP 502: ".len());
        assert!(err.detail.starts_with("HTTP 502: é"));
    }
}
