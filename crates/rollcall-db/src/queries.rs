use crate::Database;
use crate::models::VerificationRow;
use anyhow::Result;
use rusqlite::{Connection, Row};

/// Result of an idempotent verification insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(VerificationRow),
    /// A row for the same (email, event_id, day) already existed; nothing was written.
    Existing(VerificationRow),
}

impl Database {
    // -- Verifications --

    /// Insert a verification unless one exists for the key.
    /// The UNIQUE constraint makes this safe to retry after an unknown outcome.
    pub fn insert_verification(
        &self,
        id: &str,
        email: &str,
        event_id: &str,
        day: &str,
        verified_at: &str,
    ) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT INTO verifications (id, email, event_id, day, verified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email, event_id, day) DO NOTHING",
                rusqlite::params![id, email, event_id, day, verified_at],
            )?;

            let row = query_verification(conn, email, event_id, day)?
                .ok_or_else(|| anyhow::anyhow!("verification for {} vanished after insert", email))?;

            if changed == 1 {
                Ok(InsertOutcome::Inserted(row))
            } else {
                Ok(InsertOutcome::Existing(row))
            }
        })
    }

    pub fn get_verification(
        &self,
        email: &str,
        event_id: &str,
        day: &str,
    ) -> Result<Option<VerificationRow>> {
        self.with_conn(|conn| query_verification(conn, email, event_id, day))
    }

    pub fn count_verified_on(&self, event_id: &str, day: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM verifications WHERE event_id = ?1 AND day = ?2",
                [event_id, day],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    pub fn verified_emails_on(&self, event_id: &str, day: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT email FROM verifications WHERE event_id = ?1 AND day = ?2")?;
            let emails = stmt
                .query_map([event_id, day], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(emails)
        })
    }

    /// All verifications for an event/day, oldest first.
    pub fn list_verifications(&self, event_id: &str, day: &str) -> Result<Vec<VerificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, event_id, day, verified_at FROM verifications
                 WHERE event_id = ?1 AND day = ?2
                 ORDER BY verified_at ASC",
            )?;
            let rows = stmt
                .query_map([event_id, day], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_verification(
    conn: &Connection,
    email: &str,
    event_id: &str,
    day: &str,
) -> Result<Option<VerificationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, event_id, day, verified_at FROM verifications
         WHERE email = ?1 AND event_id = ?2 AND day = ?3",
    )?;

    let row = stmt.query_row([email, event_id, day], map_row).optional()?;

    Ok(row)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<VerificationRow> {
    Ok(VerificationRow {
        id: row.get(0)?,
        email: row.get(1)?,
        event_id: row.get(2)?,
        day: row.get(3)?,
        verified_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
