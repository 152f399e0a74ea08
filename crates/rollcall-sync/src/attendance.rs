//! Attendance store: the durable source of truth for check-ins.
//!
//! Every write goes through [`AttendanceStore::record_verification`], which is
//! atomic per `(email, event_id, day)`: racing callers produce one record and
//! the losers get [`StoreError::AlreadyVerified`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use rollcall_db::models::VerificationRow;
use rollcall_db::{Database, InsertOutcome};
use rollcall_types::VerificationRecord;

use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Create the record for the key, or fail with `AlreadyVerified`.
    async fn record_verification(
        &self,
        email: &str,
        event_id: &str,
        day: &str,
    ) -> StoreResult<VerificationRecord>;

    async fn get_verification(
        &self,
        email: &str,
        event_id: &str,
        day: &str,
    ) -> StoreResult<Option<VerificationRecord>>;

    async fn is_verified(&self, email: &str, event_id: &str, day: &str) -> StoreResult<bool> {
        Ok(self.get_verification(email, event_id, day).await?.is_some())
    }

    async fn count_verified_on(&self, event_id: &str, day: &str) -> StoreResult<u64>;

    async fn verified_emails_on(&self, event_id: &str, day: &str) -> StoreResult<HashSet<String>>;

    async fn list_verifications(
        &self,
        event_id: &str,
        day: &str,
    ) -> StoreResult<Vec<VerificationRecord>>;

    fn backend_name(&self) -> &'static str;
}

// -- SQLite --

/// Durable store backed by `rollcall-db`. Queries run on the blocking pool.
pub struct SqliteAttendanceStore {
    db: Arc<Database>,
}

impl SqliteAttendanceStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StoreError::Unavailable(e.to_string())
            })?
            .map_err(|e| {
                error!("Attendance DB error: {:#}", e);
                StoreError::Unavailable(format!("{:#}", e))
            })
    }
}

#[async_trait]
impl AttendanceStore for SqliteAttendanceStore {
    async fn record_verification(
        &self,
        email: &str,
        event_id: &str,
        day: &str,
    ) -> StoreResult<VerificationRecord> {
        let id = Uuid::new_v4().to_string();
        let verified_at = Utc::now().to_rfc3339();
        let (email, event_id, day) = (email.to_string(), event_id.to_string(), day.to_string());

        let outcome = self
            .blocking(move |db| db.insert_verification(&id, &email, &event_id, &day, &verified_at))
            .await?;

        match outcome {
            InsertOutcome::Inserted(row) => Ok(record_from_row(row)),
            InsertOutcome::Existing(row) => {
                Err(StoreError::AlreadyVerified(Box::new(record_from_row(row))))
            }
        }
    }

    async fn get_verification(
        &self,
        email: &str,
        event_id: &str,
        day: &str,
    ) -> StoreResult<Option<VerificationRecord>> {
        let (email, event_id, day) = (email.to_string(), event_id.to_string(), day.to_string());
        let row = self
            .blocking(move |db| db.get_verification(&email, &event_id, &day))
            .await?;
        Ok(row.map(record_from_row))
    }

    async fn count_verified_on(&self, event_id: &str, day: &str) -> StoreResult<u64> {
        let (event_id, day) = (event_id.to_string(), day.to_string());
        self.blocking(move |db| db.count_verified_on(&event_id, &day)).await
    }

    async fn verified_emails_on(&self, event_id: &str, day: &str) -> StoreResult<HashSet<String>> {
        let (event_id, day) = (event_id.to_string(), day.to_string());
        let emails = self
            .blocking(move |db| db.verified_emails_on(&event_id, &day))
            .await?;
        Ok(emails.into_iter().collect())
    }

    async fn list_verifications(
        &self,
        event_id: &str,
        day: &str,
    ) -> StoreResult<Vec<VerificationRecord>> {
        let (event_id, day) = (event_id.to_string(), day.to_string());
        let rows = self
            .blocking(move |db| db.list_verifications(&event_id, &day))
            .await?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn record_from_row(row: VerificationRow) -> VerificationRecord {
    VerificationRecord {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt verification id '{}': {}", row.id, e);
            Uuid::default()
        }),
        verified_at: DateTime::parse_from_rfc3339(&row.verified_at)
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                warn!("Corrupt verified_at '{}' on verification '{}': {}", row.verified_at, row.id, e);
                DateTime::default()
            }),
        email: row.email,
        event_id: row.event_id,
        day: row.day,
    }
}

// -- In-memory --

type Key = (String, String, String);

/// Non-durable store for tests and local runs. State is lost on restart.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    records: RwLock<HashMap<Key, VerificationRecord>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(email: &str, event_id: &str, day: &str) -> Key {
    (email.to_string(), event_id.to_string(), day.to_string())
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn record_verification(
        &self,
        email: &str,
        event_id: &str,
        day: &str,
    ) -> StoreResult<VerificationRecord> {
        let mut records = self.records.write().await;
        match records.entry(key(email, event_id, day)) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                Err(StoreError::AlreadyVerified(Box::new(existing.get().clone())))
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                let record = VerificationRecord {
                    id: Uuid::new_v4(),
                    email: email.to_string(),
                    event_id: event_id.to_string(),
                    day: day.to_string(),
                    verified_at: Utc::now(),
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get_verification(
        &self,
        email: &str,
        event_id: &str,
        day: &str,
    ) -> StoreResult<Option<VerificationRecord>> {
        Ok(self.records.read().await.get(&key(email, event_id, day)).cloned())
    }

    async fn count_verified_on(&self, event_id: &str, day: &str) -> StoreResult<u64> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.event_id == event_id && r.day == day)
            .count() as u64)
    }

    async fn verified_emails_on(&self, event_id: &str, day: &str) -> StoreResult<HashSet<String>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.event_id == event_id && r.day == day)
            .map(|r| r.email.clone())
            .collect())
    }

    async fn list_verifications(
        &self,
        event_id: &str,
        day: &str,
    ) -> StoreResult<Vec<VerificationRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<VerificationRecord> = records
            .values()
            .filter(|r| r.event_id == event_id && r.day == day)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.verified_at);
        Ok(matching)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
