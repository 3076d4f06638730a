use std::convert::TryFrom;

use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::task::{TaskKind, TaskRecord};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        title,
        owner_id,
        pair_id,
        kind,
        for_uid,
        done,
        points,
        worth,
        created_at,
        updated_at
    FROM tasks
"#;

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub pair_id: Option<String>,
    pub kind: String,
    pub for_uid: Option<String>,
    pub done: bool,
    pub points: i64,
    pub worth: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            owner_id: record.owner_id.clone(),
            pair_id: record.pair_id.clone(),
            kind: record.kind.as_str().to_string(),
            for_uid: record.for_uid.clone(),
            done: record.done,
            points: record.points,
            worth: record.worth,
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<TaskRecord> {
        let kind = TaskKind::parse(&self.kind)
            .ok_or_else(|| AppError::database(format!("未知任务类型: {}", self.kind)))?;
        Ok(TaskRecord {
            id: self.id,
            title: self.title,
            owner_id: self.owner_id,
            pair_id: self.pair_id,
            kind,
            for_uid: self.for_uid,
            done: self.done,
            points: self.points,
            worth: self.worth,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for TaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(TaskRow {
            id: row.get("id")?,
            title: row.get("title")?,
            owner_id: row.get("owner_id")?,
            pair_id: row.get("pair_id")?,
            kind: row.get("kind")?,
            for_uid: row.get("for_uid")?,
            done: row.get::<_, i64>("done")? != 0,
            points: row.get("points")?,
            worth: row.get("worth")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn insert(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id,
                    title,
                    owner_id,
                    pair_id,
                    kind,
                    for_uid,
                    done,
                    points,
                    worth,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :title,
                    :owner_id,
                    :pair_id,
                    :kind,
                    :for_uid,
                    :done,
                    :points,
                    :worth,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":title": &row.title,
                ":owner_id": &row.owner_id,
                ":pair_id": &row.pair_id,
                ":kind": &row.kind,
                ":for_uid": &row.for_uid,
                ":done": row.done as i64,
                ":points": row.points,
                ":worth": row.worth,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn update(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    title = :title,
                    owner_id = :owner_id,
                    pair_id = :pair_id,
                    kind = :kind,
                    for_uid = :for_uid,
                    done = :done,
                    points = :points,
                    worth = :worth,
                    updated_at = :updated_at
                WHERE id = :id
            "#,
            named_params! {
                ":id": &row.id,
                ":title": &row.title,
                ":owner_id": &row.owner_id,
                ":pair_id": &row.pair_id,
                ":kind": &row.kind,
                ":for_uid": &row.for_uid,
                ":done": row.done as i64,
                ":points": row.points,
                ":worth": row.worth,
                ":updated_at": &row.updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<TaskRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| TaskRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn list_for_pair(conn: &Connection, pair_id: &str) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE pair_id = ?1 ORDER BY created_at DESC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map(params![pair_id], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_for_owner(conn: &Connection, owner_id: &str) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE owner_id = ?1 ORDER BY created_at DESC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map(params![owner_id], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Alternate "earned" derivation for the shared balance: sum of points
    /// cached on completed shared tasks.
    pub fn shared_points_total(conn: &Connection, pair_id: &str) -> AppResult<i64> {
        let total = conn.query_row(
            r#"
                SELECT COALESCE(SUM(points), 0)
                FROM tasks
                WHERE pair_id = ?1 AND kind = 'shared' AND done = 1
            "#,
            params![pair_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
