use std::convert::TryFrom;

use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::pair::PairRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        member_a,
        member_b,
        invite_code,
        created_at
    FROM pairs
"#;

impl TryFrom<&Row<'_>> for PairRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(PairRecord {
            id: row.get("id")?,
            member_a: row.get("member_a")?,
            member_b: row.get("member_b")?,
            invite_code: row.get("invite_code")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct PairRepository;

impl PairRepository {
    pub fn insert(conn: &Connection, record: &PairRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO pairs (id, member_a, member_b, invite_code, created_at)
                VALUES (:id, :member_a, :member_b, :invite_code, :created_at)
            "#,
            named_params! {
                ":id": &record.id,
                ":member_a": &record.member_a,
                ":member_b": &record.member_b,
                ":invite_code": &record.invite_code,
                ":created_at": &record.created_at,
            },
        )?;

        Ok(())
    }

    pub fn update_members(conn: &Connection, record: &PairRecord) -> AppResult<()> {
        let affected = conn.execute(
            "UPDATE pairs SET member_a = ?1, member_b = ?2 WHERE id = ?3",
            params![record.member_a, record.member_b, record.id],
        )?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM pairs WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<PairRecord>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let record = stmt
            .query_row([id], |row| PairRecord::try_from(row))
            .optional()?;
        Ok(record)
    }

    pub fn find_by_invite_code(conn: &Connection, code: &str) -> AppResult<Option<PairRecord>> {
        let mut stmt = conn.prepare(&format!("{} WHERE invite_code = ?1", BASE_SELECT))?;
        let record = stmt
            .query_row([code], |row| PairRecord::try_from(row))
            .optional()?;
        Ok(record)
    }

    pub fn find_for_member(conn: &Connection, user_id: &str) -> AppResult<Option<PairRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE member_a = ?1 OR member_b = ?1",
            BASE_SELECT
        ))?;
        let record = stmt
            .query_row([user_id], |row| PairRecord::try_from(row))
            .optional()?;
        Ok(record)
    }
}
