use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::streak::StreakRecord;

impl TryFrom<&Row<'_>> for StreakRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(StreakRecord {
            pair_id: row.get("pair_id")?,
            current: row.get("current")?,
            longest: row.get("longest")?,
            last_active_date: row.get("last_active_date")?,
        })
    }
}

pub struct StreakRepository;

impl StreakRepository {
    pub fn upsert(conn: &Connection, record: &StreakRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO streaks (pair_id, current, longest, last_active_date)
                VALUES (:pair_id, :current, :longest, :last_active_date)
                ON CONFLICT(pair_id) DO UPDATE SET
                    current = excluded.current,
                    longest = excluded.longest,
                    last_active_date = excluded.last_active_date
            "#,
            named_params! {
                ":pair_id": &record.pair_id,
                ":current": record.current,
                ":longest": record.longest,
                ":last_active_date": &record.last_active_date,
            },
        )?;

        Ok(())
    }

    pub fn find_by_pair(conn: &Connection, pair_id: &str) -> AppResult<Option<StreakRecord>> {
        let mut stmt = conn.prepare(
            "SELECT pair_id, current, longest, last_active_date FROM streaks WHERE pair_id = ?1",
        )?;
        let record = stmt
            .query_row([pair_id], |row| StreakRecord::try_from(row))
            .optional()?;
        Ok(record)
    }
}
