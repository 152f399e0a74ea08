use std::collections::HashSet;

use tracing::{debug, warn};

use rollcall_types::Guest;

use crate::{GuestSource, SourceUnavailable};

/// Page cap used when the caller has no opinion. Bounds a refresh even if a
/// provider's cursor loops.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Every guest one fetch produced, in provider order.
#[derive(Debug, Clone, Default)]
pub struct FetchedGuests {
    pub guests: Vec<Guest>,
    pub pages: usize,
    /// The page cap was hit while the provider still offered a cursor.
    pub truncated: bool,
    /// Entries dropped because their email was already seen in this fetch.
    pub duplicates: usize,
}

/// Walk the provider's cursor until it runs out or `max_pages` is reached.
///
/// Any failing page aborts the whole fetch. Hitting the cap returns what was
/// collected so far with `truncated` set.
pub async fn fetch_all_guests(
    source: &dyn GuestSource,
    max_pages: usize,
) -> Result<FetchedGuests, SourceUnavailable> {
    let max_pages = max_pages.max(1);
    let mut fetched = FetchedGuests::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        if fetched.pages >= max_pages {
            warn!(
                "{} ({}): page cap of {} reached with cursor still pending, keeping {} guests",
                source.provider(),
                source.describe(),
                max_pages,
                fetched.guests.len()
            );
            fetched.truncated = true;
            break;
        }

        let page = source.fetch_page(cursor.as_deref()).await?;
        fetched.pages += 1;

        debug!(
            "{} ({}): page {} returned {} entries",
            source.provider(),
            source.describe(),
            fetched.pages,
            page.entries.len()
        );

        for guest in page.entries {
            if seen.insert(guest.email.clone()) {
                fetched.guests.push(guest);
            } else {
                fetched.duplicates += 1;
            }
        }

        match page.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    if fetched.duplicates > 0 {
        debug!(
            "{} ({}): dropped {} duplicate emails",
            source.provider(),
            source.describe(),
            fetched.duplicates
        );
    }

    Ok(fetched)
}
