#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use rollcall_sources::{GuestPage, GuestSource, SourceUnavailable};
use rollcall_sync::{Engine, EngineConfig, MemoryAttendanceStore};
use rollcall_types::Guest;

/// In-process guest source that counts calls and can be slowed or broken.
#[derive(Default)]
pub struct StubSource {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
    delay_ms: AtomicUsize,
    emails: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn with_guests(emails: &[&str]) -> Arc<Self> {
        let source = Self::default();
        source.set_guests(emails);
        Arc::new(source)
    }

    pub fn set_guests(&self, emails: &[&str]) {
        *self.emails.lock().unwrap() = emails.iter().map(|e| e.to_string()).collect();
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GuestSource for StubSource {
    fn provider(&self) -> &'static str {
        "stub"
    }

    fn describe(&self) -> String {
        "stub-event".into()
    }

    async fn fetch_page(&self, _cursor: Option<&str>) -> Result<GuestPage, SourceUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceUnavailable::http("stub", 503, "upstream down"));
        }

        let entries = self
            .emails
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .filter_map(|(i, e)| Guest::new(i.to_string(), e))
            .collect();
        Ok(GuestPage {
            entries,
            next_cursor: None,
        })
    }
}

pub fn engine_with(event_id: &str, source: Arc<StubSource>) -> Engine {
    engine_with_config(event_id, source, EngineConfig::default())
}

pub fn engine_with_config(event_id: &str, source: Arc<StubSource>, config: EngineConfig) -> Engine {
    let engine = Engine::new(Arc::new(MemoryAttendanceStore::new()), config);
    engine.register(event_id, source).unwrap();
    engine
}
