use std::convert::TryFrom;

use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::point_entry::EntryScope;
use crate::models::reward::RewardRedemptionRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        reward_id,
        title,
        cost,
        scope,
        pair_id,
        redeemed_by,
        created_at
    FROM reward_redemptions
"#;

impl TryFrom<&Row<'_>> for RewardRedemptionRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        let raw_scope: String = row.get("scope")?;
        Ok(RewardRedemptionRecord {
            id: row.get("id")?,
            reward_id: row.get("reward_id")?,
            title: row.get("title")?,
            cost: row.get("cost")?,
            scope: EntryScope::parse(&raw_scope).unwrap_or(EntryScope::Shared),
            pair_id: row.get("pair_id")?,
            redeemed_by: row.get("redeemed_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct RedemptionRepository;

impl RedemptionRepository {
    pub fn insert(conn: &Connection, record: &RewardRedemptionRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO reward_redemptions (
                    id,
                    reward_id,
                    title,
                    cost,
                    scope,
                    pair_id,
                    redeemed_by,
                    created_at
                ) VALUES (
                    :id,
                    :reward_id,
                    :title,
                    :cost,
                    :scope,
                    :pair_id,
                    :redeemed_by,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &record.id,
                ":reward_id": &record.reward_id,
                ":title": &record.title,
                ":cost": record.cost,
                ":scope": record.scope.as_str(),
                ":pair_id": &record.pair_id,
                ":redeemed_by": &record.redeemed_by,
                ":created_at": &record.created_at,
            },
        )?;

        Ok(())
    }

    /// Undo is a delete of the append-only record, not a reversal row.
    pub fn delete(conn: &Connection, id: &str) -> AppResult<bool> {
        let affected = conn.execute("DELETE FROM reward_redemptions WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<RewardRedemptionRecord>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let record = stmt
            .query_row([id], |row| RewardRedemptionRecord::try_from(row))
            .optional()?;
        Ok(record)
    }

    pub fn list_for_pair(
        conn: &Connection,
        pair_id: &str,
    ) -> AppResult<Vec<RewardRedemptionRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE pair_id = ?1 ORDER BY created_at DESC",
            BASE_SELECT
        ))?;
        let records = stmt
            .query_map(params![pair_id], |row| RewardRedemptionRecord::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Shared spend: every shared redemption by either partner counts.
    pub fn shared_spent_total(conn: &Connection, pair_id: &str) -> AppResult<i64> {
        let total = conn.query_row(
            r#"
                SELECT COALESCE(SUM(cost), 0)
                FROM reward_redemptions
                WHERE pair_id = ?1 AND scope = 'shared'
            "#,
            params![pair_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Personal spend: only the redeeming partner's own redemptions count.
    pub fn personal_spent_total(
        conn: &Connection,
        pair_id: &str,
        user_id: &str,
    ) -> AppResult<i64> {
        let total = conn.query_row(
            r#"
                SELECT COALESCE(SUM(cost), 0)
                FROM reward_redemptions
                WHERE pair_id = ?1 AND scope = 'personal' AND redeemed_by = ?2
            "#,
            params![pair_id, user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
