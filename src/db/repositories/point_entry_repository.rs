use std::convert::TryFrom;

use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::point_entry::{EntryMeta, EntryScope, PointEntryRecord};
use crate::utils::points::classify_entry;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        pair_id,
        owner_id,
        value,
        reason,
        task_id,
        scope,
        kind,
        for_uid,
        created_at
    FROM point_entries
"#;

#[derive(Debug, Clone)]
pub struct PointEntryRow {
    pub id: String,
    pub pair_id: String,
    pub owner_id: String,
    pub value: i64,
    pub reason: String,
    pub task_id: Option<String>,
    pub scope: Option<String>,
    pub kind: Option<String>,
    pub for_uid: Option<String>,
    pub created_at: String,
}

impl PointEntryRow {
    pub fn from_record(record: &PointEntryRecord) -> Self {
        Self {
            id: record.id.clone(),
            pair_id: record.pair_id.clone().unwrap_or_default(),
            owner_id: record.owner_id.clone(),
            value: record.value,
            reason: record.reason.clone(),
            task_id: record.task_id.clone(),
            scope: Some(record.scope.as_str().to_string()),
            kind: record.kind.clone(),
            for_uid: record.for_uid.clone(),
            created_at: record.created_at.clone(),
        }
    }

    pub fn into_record(self) -> PointEntryRecord {
        // Rows written before the v1 backfill ran on this database can still
        // carry a NULL scope; classify them on the way out.
        let scope = self
            .scope
            .as_deref()
            .and_then(EntryScope::parse)
            .unwrap_or_else(|| {
                classify_entry(&EntryMeta {
                    reason: Some(self.reason.clone()),
                    scope: self.scope.clone(),
                    kind: self.kind.clone(),
                    for_uid: self.for_uid.clone(),
                })
            });

        PointEntryRecord {
            id: self.id,
            owner_id: self.owner_id,
            pair_id: if self.pair_id.is_empty() {
                None
            } else {
                Some(self.pair_id)
            },
            value: self.value,
            reason: self.reason,
            task_id: self.task_id,
            scope,
            kind: self.kind,
            for_uid: self.for_uid,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<&Row<'_>> for PointEntryRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(PointEntryRow {
            id: row.get("id")?,
            pair_id: row.get("pair_id")?,
            owner_id: row.get("owner_id")?,
            value: row.get("value")?,
            reason: row.get("reason")?,
            task_id: row.get("task_id")?,
            scope: row.get("scope")?,
            kind: row.get("kind")?,
            for_uid: row.get("for_uid")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct PointEntryRepository;

impl PointEntryRepository {
    pub fn insert(conn: &Connection, row: &PointEntryRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO point_entries (
                    id,
                    pair_id,
                    owner_id,
                    value,
                    reason,
                    task_id,
                    scope,
                    kind,
                    for_uid,
                    created_at
                ) VALUES (
                    :id,
                    :pair_id,
                    :owner_id,
                    :value,
                    :reason,
                    :task_id,
                    :scope,
                    :kind,
                    :for_uid,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":pair_id": &row.pair_id,
                ":owner_id": &row.owner_id,
                ":value": row.value,
                ":reason": &row.reason,
                ":task_id": &row.task_id,
                ":scope": &row.scope,
                ":kind": &row.kind,
                ":for_uid": &row.for_uid,
                ":created_at": &row.created_at,
            },
        )?;

        Ok(())
    }

    /// Replicated entries may arrive more than once; last write wins.
    pub fn upsert(conn: &Connection, row: &PointEntryRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT OR REPLACE INTO point_entries (
                    id,
                    pair_id,
                    owner_id,
                    value,
                    reason,
                    task_id,
                    scope,
                    kind,
                    for_uid,
                    created_at
                ) VALUES (
                    :id,
                    :pair_id,
                    :owner_id,
                    :value,
                    :reason,
                    :task_id,
                    :scope,
                    :kind,
                    :for_uid,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":pair_id": &row.pair_id,
                ":owner_id": &row.owner_id,
                ":value": row.value,
                ":reason": &row.reason,
                ":task_id": &row.task_id,
                ":scope": &row.scope,
                ":kind": &row.kind,
                ":for_uid": &row.for_uid,
                ":created_at": &row.created_at,
            },
        )?;

        Ok(())
    }

    pub fn delete(conn: &Connection, pair_id: &str, id: &str) -> AppResult<bool> {
        let affected = conn.execute(
            "DELETE FROM point_entries WHERE pair_id = ?1 AND id = ?2",
            params![pair_id, id],
        )?;
        Ok(affected > 0)
    }

    pub fn find_by_id(conn: &Connection, pair_id: &str, id: &str) -> AppResult<Option<PointEntryRow>> {
        let mut stmt =
            conn.prepare(&format!("{} WHERE pair_id = ?1 AND id = ?2", BASE_SELECT))?;
        let row = stmt
            .query_row(params![pair_id, id], |row| PointEntryRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn find_by_task(conn: &Connection, task_id: &str) -> AppResult<Option<PointEntryRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE task_id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row(params![task_id], |row| PointEntryRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn list_for_pair(conn: &Connection, pair_id: &str) -> AppResult<Vec<PointEntryRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE pair_id = ?1 ORDER BY created_at DESC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map(params![pair_id], |row| PointEntryRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full ledger scan, used to seed the live feed on startup.
    pub fn list_all(conn: &Connection) -> AppResult<Vec<PointEntryRow>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at", BASE_SELECT))?;
        let rows = stmt
            .query_map([], |row| PointEntryRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn earned_shared_total(conn: &Connection, pair_id: &str) -> AppResult<i64> {
        let total = conn.query_row(
            r#"
                SELECT COALESCE(SUM(value), 0)
                FROM point_entries
                WHERE pair_id = ?1 AND scope = 'shared' AND value > 0
            "#,
            params![pair_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn earned_personal_total(
        conn: &Connection,
        pair_id: &str,
        user_id: &str,
    ) -> AppResult<i64> {
        let total = conn.query_row(
            r#"
                SELECT COALESCE(SUM(value), 0)
                FROM point_entries
                WHERE pair_id = ?1
                  AND scope = 'personal'
                  AND value > 0
                  AND COALESCE(for_uid, owner_id) = ?2
            "#,
            params![pair_id, user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Debits written by the retired negative-entry redemption path. Still
    /// counted as spend alongside redemption records.
    pub fn legacy_shared_debit_total(conn: &Connection, pair_id: &str) -> AppResult<i64> {
        let total: i64 = conn.query_row(
            r#"
                SELECT COALESCE(SUM(-value), 0)
                FROM point_entries
                WHERE pair_id = ?1 AND scope = 'shared' AND value < 0
            "#,
            params![pair_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn legacy_personal_debit_total(
        conn: &Connection,
        pair_id: &str,
        user_id: &str,
    ) -> AppResult<i64> {
        let total: i64 = conn.query_row(
            r#"
                SELECT COALESCE(SUM(-value), 0)
                FROM point_entries
                WHERE pair_id = ?1
                  AND scope = 'personal'
                  AND value < 0
                  AND owner_id = ?2
            "#,
            params![pair_id, user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
