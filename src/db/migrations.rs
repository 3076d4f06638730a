use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::AppResult;
use crate::models::point_entry::EntryMeta;
use crate::utils::points::classify_entry;

const USER_VERSION: i32 = 2;

pub fn run(conn: &Connection) -> AppResult<()> {
    // Ensure migration history table exists
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS migration_history (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        "#,
    )?;

    let mut current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version < 1 {
        info!(target: "app::db", version = current_version, "running migration v1");
        migrate_to_v1(conn)?;
        current_version = 1;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(conn, 1, "Backfill ledger scope from legacy reason/kind/forUid signals")?;
    }

    if current_version < 2 {
        info!(target: "app::db", version = current_version, "running migration v2");
        migrate_to_v2(conn)?;
        current_version = 2;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(conn, 2, "Refresh cached task points for completed tasks")?;
    }

    debug_assert!(current_version >= USER_VERSION);

    Ok(())
}

/// One-time replacement for the runtime classification cascade: rows written
/// before scope became authoritative are classified here, once, and the
/// cascade never runs against stored rows again.
fn migrate_to_v1(conn: &Connection) -> AppResult<()> {
    let mut stmt = conn.prepare(
        r#"
            SELECT pair_id, id, reason, kind, for_uid
            FROM point_entries
            WHERE scope IS NULL OR scope NOT IN ('shared', 'personal')
        "#,
    )?;

    let legacy_rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let backfilled = legacy_rows.len();
    for (pair_id, id, reason, kind, for_uid) in legacy_rows {
        let meta = EntryMeta {
            reason,
            scope: None,
            kind,
            for_uid,
        };
        let scope = classify_entry(&meta);
        conn.execute(
            "UPDATE point_entries SET scope = ?1 WHERE pair_id = ?2 AND id = ?3",
            params![scope.as_str(), pair_id, id],
        )?;
    }

    if backfilled > 0 {
        info!(target: "app::db", backfilled, "classified legacy ledger rows");
    }

    Ok(())
}

/// Older revisions left `points` at 0 on completed tasks and derived the
/// awarded value from `worth` at read time. Persist it instead.
fn migrate_to_v2(conn: &Connection) -> AppResult<()> {
    let refreshed = conn.execute(
        "UPDATE tasks SET points = worth WHERE done = 1 AND points = 0 AND worth > 0",
        [],
    )?;
    if refreshed > 0 {
        info!(target: "app::db", refreshed, "refreshed cached task points");
    }
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, description: &str) -> AppResult<()> {
    conn.execute(
        r#"
            INSERT OR IGNORE INTO migration_history (version, description, applied_at)
            VALUES (?1, ?2, ?3)
        "#,
        params![version, description, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
