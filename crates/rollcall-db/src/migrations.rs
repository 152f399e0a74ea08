use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (verifications)");
        conn.execute_batch(
            "
            CREATE TABLE verifications (
                id           TEXT PRIMARY KEY,
                email        TEXT NOT NULL,
                event_id     TEXT NOT NULL,
                day          TEXT NOT NULL,
                verified_at  TEXT NOT NULL,
                UNIQUE(email, event_id, day)
            );

            CREATE INDEX idx_verifications_event_day
                ON verifications(event_id, day);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
