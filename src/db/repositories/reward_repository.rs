use std::convert::TryFrom;

use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::point_entry::EntryScope;
use crate::models::reward::RewardRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        owner_id,
        pair_id,
        title,
        cost,
        scope,
        created_at,
        updated_at
    FROM rewards
"#;

impl TryFrom<&Row<'_>> for RewardRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        let raw_scope: String = row.get("scope")?;
        Ok(RewardRecord {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            pair_id: row.get("pair_id")?,
            title: row.get("title")?,
            cost: row.get("cost")?,
            scope: EntryScope::parse(&raw_scope).unwrap_or(EntryScope::Shared),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct RewardRepository;

impl RewardRepository {
    pub fn insert(conn: &Connection, record: &RewardRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO rewards (
                    id,
                    owner_id,
                    pair_id,
                    title,
                    cost,
                    scope,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :owner_id,
                    :pair_id,
                    :title,
                    :cost,
                    :scope,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &record.id,
                ":owner_id": &record.owner_id,
                ":pair_id": &record.pair_id,
                ":title": &record.title,
                ":cost": record.cost,
                ":scope": record.scope.as_str(),
                ":created_at": &record.created_at,
                ":updated_at": &record.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn update(conn: &Connection, record: &RewardRecord) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE rewards SET
                    title = :title,
                    cost = :cost,
                    scope = :scope,
                    updated_at = :updated_at
                WHERE id = :id
            "#,
            named_params! {
                ":id": &record.id,
                ":title": &record.title,
                ":cost": record.cost,
                ":scope": record.scope.as_str(),
                ":updated_at": &record.updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM rewards WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<RewardRecord>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let record = stmt
            .query_row([id], |row| RewardRecord::try_from(row))
            .optional()?;
        Ok(record)
    }

    pub fn list_for_pair(conn: &Connection, pair_id: &str) -> AppResult<Vec<RewardRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE pair_id = ?1 ORDER BY created_at DESC",
            BASE_SELECT
        ))?;
        let records = stmt
            .query_map(params![pair_id], |row| RewardRecord::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
