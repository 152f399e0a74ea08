//! Reconciliation engine.
//!
//! Holds one slot per registered event. A slot keeps the last good guest
//! snapshot, the refresh currently in flight (if any), and the cancellation
//! token of its polling timer.
//!
//! Refreshes for one event are coalesced: the first caller installs a shared
//! future in the slot and every later caller awaits that same future until it
//! resolves. A failed refresh never touches the stored snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rollcall_sources::{DEFAULT_MAX_PAGES, FetchedGuests, GuestSource, SourceUnavailable, fetch_all_guests};
use rollcall_types::api::{EventStatus, TrackerResponse};
use rollcall_types::events::LiveEvent;
use rollcall_types::Guest;

use crate::attendance::AttendanceStore;
use crate::error::SyncError;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const LIVE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub refresh_interval: Duration,
    pub max_pages: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Guests of one successful fetch, indexed by email.
#[derive(Debug, Clone, Default)]
pub struct GuestSnapshot {
    guests: Vec<Guest>,
    index: HashMap<String, usize>,
    fetched_at: Option<DateTime<Utc>>,
    pages: usize,
    truncated: bool,
}

impl GuestSnapshot {
    /// Placeholder served before the first successful refresh.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_fetch(fetched: FetchedGuests, fetched_at: DateTime<Utc>) -> Self {
        let index = fetched
            .guests
            .iter()
            .enumerate()
            .map(|(i, g)| (g.email.clone(), i))
            .collect();
        Self {
            guests: fetched.guests,
            index,
            fetched_at: Some(fetched_at),
            pages: fetched.pages,
            truncated: fetched.truncated,
        }
    }

    pub fn guests(&self) -> &[Guest] {
        &self.guests
    }

    pub fn len(&self) -> usize {
        self.guests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guests.is_empty()
    }

    /// Exact lookup by normalized email.
    pub fn get(&self, email: &str) -> Option<&Guest> {
        self.index.get(email).map(|&i| &self.guests[i])
    }

    pub fn contains(&self, email: &str) -> bool {
        self.index.contains_key(email)
    }

    /// `None` until the first successful refresh.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Guest snapshot joined with the verifications of one day.
#[derive(Debug, Clone)]
pub struct ReconciledView {
    pub event_id: String,
    pub day: String,
    pub guests: Arc<GuestSnapshot>,
    pub verified_emails: HashSet<String>,
    pub last_error: Option<RefreshFailure>,
}

impl ReconciledView {
    pub fn registered_count(&self) -> usize {
        self.guests.len()
    }

    /// Every check-in for the day counts, listed in the snapshot or not.
    pub fn verified_count(&self) -> usize {
        self.verified_emails.len()
    }

    pub fn unlisted_verified_count(&self) -> usize {
        self.verified_emails
            .iter()
            .filter(|e| !self.guests.contains(e))
            .count()
    }

    pub fn is_verified(&self, email: &str) -> bool {
        self.verified_emails.contains(email)
    }

    pub fn tracker(&self) -> TrackerResponse {
        TrackerResponse {
            event_id: self.event_id.clone(),
            day: self.day.clone(),
            registered_count: self.registered_count(),
            verified_count: self.verified_count(),
            unlisted_verified_count: self.unlisted_verified_count(),
            last_updated: self.guests.fetched_at(),
            last_error: self.last_error.as_ref().map(|f| f.message.clone()),
            truncated: self.guests.truncated(),
        }
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<GuestSnapshot>, SourceUnavailable>>>;

struct EventSlot {
    event_id: String,
    source: Arc<dyn GuestSource>,
    state: Mutex<SlotState>,
}

struct SlotState {
    snapshot: Arc<GuestSnapshot>,
    in_flight: Option<RefreshFuture>,
    last_error: Option<RefreshFailure>,
    last_attempt: Option<DateTime<Utc>>,
    timer: Option<CancellationToken>,
}

impl EventSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // Slot state stays consistent across a panic: every field is replaced wholesale.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns every event's view and polling timer.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn AttendanceStore>,
    config: EngineConfig,
    events: RwLock<HashMap<String, Arc<EventSlot>>>,
    live_tx: broadcast::Sender<LiveEvent>,
}

impl Engine {
    pub fn new(store: Arc<dyn AttendanceStore>, config: EngineConfig) -> Self {
        let (live_tx, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(EngineInner {
                store,
                config,
                events: RwLock::new(HashMap::new()),
                live_tx,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn AttendanceStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // -- Lifecycle --

    /// Register an event with the source its guest list comes from. The view
    /// starts empty until the first refresh.
    pub fn register(&self, event_id: &str, source: Arc<dyn GuestSource>) -> Result<(), SyncError> {
        let mut events = self.inner.events.write().unwrap_or_else(PoisonError::into_inner);
        if events.contains_key(event_id) {
            return Err(SyncError::DuplicateEvent(event_id.to_string()));
        }

        info!(
            "Registered event {} ({}:{})",
            event_id,
            source.provider(),
            source.describe()
        );
        events.insert(
            event_id.to_string(),
            Arc::new(EventSlot {
                event_id: event_id.to_string(),
                source,
                state: Mutex::new(SlotState {
                    snapshot: Arc::new(GuestSnapshot::empty()),
                    in_flight: None,
                    last_error: None,
                    last_attempt: None,
                    timer: None,
                }),
            }),
        );
        Ok(())
    }

    /// Start polling the event's source. The first refresh fires immediately.
    /// Starting an already polling event is a no-op.
    pub fn start(&self, event_id: &str) -> Result<(), SyncError> {
        let slot = self.slot(event_id)?;
        let token = {
            let mut state = slot.lock();
            if state.timer.is_some() {
                return Ok(());
            }
            let token = CancellationToken::new();
            state.timer = Some(token.clone());
            token
        };

        let period = self.inner.config.refresh_interval;
        info!("{}: polling every {:?}", event_id, period);
        tokio::spawn(self.clone().poll_loop(event_id.to_string(), period, token));
        Ok(())
    }

    /// Stop polling. Returns whether a timer was running.
    pub fn stop(&self, event_id: &str) -> Result<bool, SyncError> {
        let slot = self.slot(event_id)?;
        let token = slot.lock().timer.take();
        Ok(match token {
            Some(token) => {
                token.cancel();
                info!("{}: polling stopped", event_id);
                true
            }
            None => false,
        })
    }

    /// Stop polling and drop the event's view.
    pub fn remove(&self, event_id: &str) -> bool {
        let removed = self
            .inner
            .events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event_id);

        let Some(slot) = removed else {
            return false;
        };
        let mut state = slot.lock();
        if let Some(token) = state.timer.take() {
            token.cancel();
        }
        // The in-flight future holds the slot; release it so the slot can drop.
        state.in_flight = None;
        info!("Removed event {}", event_id);
        true
    }

    /// Stop every polling timer.
    pub fn shutdown(&self) {
        for slot in self.slots() {
            if let Some(token) = slot.lock().timer.take() {
                token.cancel();
            }
        }
        info!("All refresh timers stopped");
    }

    pub fn event_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots().iter().map(|s| s.event_id.clone()).collect();
        ids.sort();
        ids
    }

    // -- Refresh --

    /// Re-fetch the event's guest list and return the fresh view for `day`.
    pub async fn refresh(&self, event_id: &str, day: &str) -> Result<ReconciledView, SyncError> {
        self.refresh_snapshot(event_id).await?;
        self.current_view(event_id, day).await
    }

    /// Re-fetch the guest list, joining a refresh already in flight if there is one.
    pub async fn refresh_snapshot(&self, event_id: &str) -> Result<Arc<GuestSnapshot>, SyncError> {
        let slot = self.slot(event_id)?;
        let refresh = self.begin_refresh(&slot);
        Ok(refresh.await?)
    }

    fn begin_refresh(&self, slot: &Arc<EventSlot>) -> RefreshFuture {
        let mut state = slot.lock();
        if let Some(in_flight) = &state.in_flight {
            debug!("{}: joining in-flight refresh", slot.event_id);
            return in_flight.clone();
        }

        state.last_attempt = Some(Utc::now());
        let refresh = run_refresh(
            slot.clone(),
            self.inner.config.max_pages,
            self.inner.live_tx.clone(),
        )
        .boxed()
        .shared();
        state.in_flight = Some(refresh.clone());
        refresh
    }

    async fn poll_loop(self, event_id: String, period: Duration, token: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                _ = token.cancelled() => break,
                result = self.refresh_snapshot(&event_id) => match result {
                    Ok(_) => {}
                    Err(SyncError::UnknownEvent(_)) => break,
                    // Already logged by the refresh; try again next tick.
                    Err(e) => debug!("{}: scheduled refresh failed: {}", event_id, e),
                }
            }
        }

        debug!("{}: poll loop exited", event_id);
    }

    // -- Views --

    /// Last good guest snapshot. No I/O.
    pub fn snapshot(&self, event_id: &str) -> Result<Arc<GuestSnapshot>, SyncError> {
        Ok(self.slot(event_id)?.lock().snapshot.clone())
    }

    /// Last good snapshot joined with the store's check-ins for `day`.
    /// Never fetches from the source, and ignores any refresh in flight.
    pub async fn current_view(&self, event_id: &str, day: &str) -> Result<ReconciledView, SyncError> {
        let slot = self.slot(event_id)?;
        let (guests, last_error) = {
            let state = slot.lock();
            (state.snapshot.clone(), state.last_error.clone())
        };

        let verified_emails = self.inner.store.verified_emails_on(event_id, day).await?;

        Ok(ReconciledView {
            event_id: event_id.to_string(),
            day: day.to_string(),
            guests,
            verified_emails,
            last_error,
        })
    }

    pub fn status(&self, event_id: &str) -> Result<EventStatus, SyncError> {
        let slot = self.slot(event_id)?;
        Ok(slot_status(&slot))
    }

    pub fn statuses(&self) -> Vec<EventStatus> {
        let mut statuses: Vec<EventStatus> = self.slots().iter().map(|s| slot_status(s)).collect();
        statuses.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        statuses
    }

    // -- Live events --

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.inner.live_tx.subscribe()
    }

    pub(crate) fn publish(&self, event: LiveEvent) {
        // No subscribers is fine.
        let _ = self.inner.live_tx.send(event);
    }

    fn slot(&self, event_id: &str) -> Result<Arc<EventSlot>, SyncError> {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownEvent(event_id.to_string()))
    }

    fn slots(&self) -> Vec<Arc<EventSlot>> {
        self.inner
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

fn slot_status(slot: &EventSlot) -> EventStatus {
    let state = slot.lock();
    EventStatus {
        event_id: slot.event_id.clone(),
        source: format!("{}:{}", slot.source.provider(), slot.source.describe()),
        registered_count: state.snapshot.len(),
        polling: state.timer.is_some(),
        last_updated: state.snapshot.fetched_at(),
        last_attempt: state.last_attempt,
        last_error: state.last_error.as_ref().map(|f| f.message.clone()),
    }
}

/// One upstream fetch. Publishes the outcome to the slot and the live channel.
async fn run_refresh(
    slot: Arc<EventSlot>,
    max_pages: usize,
    live_tx: broadcast::Sender<LiveEvent>,
) -> Result<Arc<GuestSnapshot>, SourceUnavailable> {
    let result = fetch_all_guests(slot.source.as_ref(), max_pages).await;
    let now = Utc::now();

    let mut state = slot.lock();
    state.in_flight = None;

    match result {
        Ok(fetched) => {
            let snapshot = Arc::new(GuestSnapshot::from_fetch(fetched, now));
            state.snapshot = snapshot.clone();
            state.last_error = None;
            drop(state);

            info!(
                "{}: snapshot replaced, {} guests over {} pages{}",
                slot.event_id,
                snapshot.len(),
                snapshot.pages(),
                if snapshot.truncated() { " (truncated)" } else { "" }
            );
            let _ = live_tx.send(LiveEvent::SnapshotRefreshed {
                event_id: slot.event_id.clone(),
                registered_count: snapshot.len(),
                truncated: snapshot.truncated(),
                fetched_at: now,
            });
            Ok(snapshot)
        }
        Err(e) => {
            state.last_error = Some(RefreshFailure {
                message: e.to_string(),
                at: now,
            });
            drop(state);

            warn!("{}: refresh failed, keeping previous snapshot: {}", slot.event_id, e);
            let _ = live_tx.send(LiveEvent::RefreshFailed {
                event_id: slot.event_id.clone(),
                error: e.to_string(),
                at: now,
            });
            Err(e)
        }
    }
}
