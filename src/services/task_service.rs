use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::repositories::task_repository::{TaskRepository, TaskRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::point_entry::{EntryScope, PointEntryCreateInput};
use crate::models::task::{TaskCreateInput, TaskKind, TaskRecord, TaskUpdateInput};
use crate::services::ledger_service::LedgerService;
use crate::services::streak_service::StreakService;

const MAX_TITLE_CHARS: usize = 160;
const MAX_WORTH: i64 = 1000;

#[derive(Clone)]
pub struct TaskService {
    db: DbPool,
    ledger: Arc<LedgerService>,
    streaks: Arc<StreakService>,
}

impl TaskService {
    pub fn new(db: DbPool, ledger: Arc<LedgerService>, streaks: Arc<StreakService>) -> Self {
        Self {
            db,
            ledger,
            streaks,
        }
    }

    pub fn create_task(&self, input: TaskCreateInput) -> AppResult<TaskRecord> {
        let mut record = build_record_from_create(input)?;
        let now = Utc::now().to_rfc3339();
        record.id = uuid::Uuid::new_v4().to_string();
        record.created_at = now.clone();
        record.updated_at = now;

        let row = TaskRow::from_record(&record);
        self.db
            .with_connection(|conn| TaskRepository::insert(conn, &row))?;
        info!(task_id = %record.id, "task created");
        Ok(record)
    }

    pub fn update_task(&self, id: &str, update: TaskUpdateInput) -> AppResult<TaskRecord> {
        let mut existing = self.get_task(id)?;
        apply_update(&mut existing, update)?;
        existing.updated_at = Utc::now().to_rfc3339();
        validate_record(&existing)?;

        let row = TaskRow::from_record(&existing);
        self.db
            .with_connection(|conn| TaskRepository::update(conn, &row))?;
        info!(task_id = %existing.id, "task updated");
        Ok(existing)
    }

    pub fn delete_task(&self, id: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| TaskRepository::delete(conn, id))?;
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> AppResult<TaskRecord> {
        let row = self
            .db
            .with_connection(|conn| TaskRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;
        let record = row.into_record()?;
        debug!(task_id = %record.id, "task fetched");
        Ok(record)
    }

    pub fn list_tasks(&self, pair_id: &str) -> AppResult<Vec<TaskRecord>> {
        let rows = self
            .db
            .with_connection(|conn| TaskRepository::list_for_pair(conn, pair_id))?;
        let tasks = rows
            .into_iter()
            .map(TaskRow::into_record)
            .collect::<AppResult<Vec<_>>>()?;
        debug!(count = tasks.len(), "tasks listed");
        Ok(tasks)
    }

    /// Mark a task done: cache the awarded points on the task, write the
    /// matching ledger entry, and advance the pair's streak.
    pub fn complete_task(&self, id: &str) -> AppResult<TaskRecord> {
        let mut task = self.get_task(id)?;
        if task.done {
            return Err(AppError::conflict("任务已完成"));
        }

        task.done = true;
        task.points = task.worth;
        task.updated_at = Utc::now().to_rfc3339();

        let row = TaskRow::from_record(&task);
        self.db
            .with_connection(|conn| TaskRepository::update(conn, &row))?;

        if task.worth > 0 {
            let (scope, reason, for_uid) = match task.kind {
                TaskKind::Shared => (
                    EntryScope::Shared,
                    format!("Task: {}", task.title),
                    None,
                ),
                TaskKind::Personal => (
                    EntryScope::Personal,
                    format!("Personal task: {}", task.title),
                    task.for_uid.clone(),
                ),
            };
            self.ledger.award_points(PointEntryCreateInput {
                owner_id: task.owner_id.clone(),
                pair_id: task.pair_id.clone(),
                value: task.worth,
                reason: Some(reason),
                task_id: Some(task.id.clone()),
                scope: Some(scope),
                for_uid,
            })?;
        }

        if let Some(pair_id) = &task.pair_id {
            self.streaks
                .record_activity(pair_id, Utc::now().date_naive())?;
        }

        info!(task_id = %task.id, points = task.points, "task completed");
        Ok(task)
    }

    /// Reopen a completed task and undo its award.
    pub fn reopen_task(&self, id: &str) -> AppResult<TaskRecord> {
        let mut task = self.get_task(id)?;
        if !task.done {
            return Err(AppError::conflict("任务尚未完成"));
        }

        task.done = false;
        task.points = 0;
        task.updated_at = Utc::now().to_rfc3339();

        let row = TaskRow::from_record(&task);
        self.db
            .with_connection(|conn| TaskRepository::update(conn, &row))?;

        if let Some(entry) = self.ledger.entry_for_task(&task.id)? {
            self.ledger
                .undo_entry(entry.pair_id.as_deref(), &entry.id)?;
        }

        info!(task_id = %task.id, "task reopened");
        Ok(task)
    }
}

fn build_record_from_create(mut input: TaskCreateInput) -> AppResult<TaskRecord> {
    let title = normalize_title(&input.title)?;
    if input.owner_id.trim().is_empty() {
        return Err(AppError::validation("任务必须指定所有者"));
    }
    let kind = input.kind.take().unwrap_or(TaskKind::Shared);
    let worth = normalize_worth(input.worth.take())?;
    let for_uid = match kind {
        // Shared tasks benefit both partners; a beneficiary is meaningless.
        TaskKind::Shared => None,
        TaskKind::Personal => Some(
            input
                .for_uid
                .take()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| AppError::validation("个人任务必须指定受益人"))?,
        ),
    };

    let record = TaskRecord {
        id: String::new(),
        title,
        owner_id: input.owner_id,
        pair_id: input.pair_id,
        kind,
        for_uid,
        done: false,
        points: 0,
        worth,
        created_at: String::new(),
        updated_at: String::new(),
    };
    validate_record(&record)?;
    Ok(record)
}

fn apply_update(record: &mut TaskRecord, update: TaskUpdateInput) -> AppResult<()> {
    if let Some(title) = update.title {
        record.title = normalize_title(&title)?;
    }
    if let Some(kind) = update.kind {
        record.kind = kind;
        if kind == TaskKind::Shared {
            record.for_uid = None;
        }
    }
    if let Some(for_uid) = update.for_uid {
        record.for_uid = for_uid
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }
    if let Some(worth) = update.worth {
        record.worth = normalize_worth(Some(worth))?;
    }
    Ok(())
}

fn validate_record(record: &TaskRecord) -> AppResult<()> {
    if record.kind == TaskKind::Personal && record.for_uid.is_none() {
        return Err(AppError::validation("个人任务必须指定受益人"));
    }
    Ok(())
}

fn normalize_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("标题不能为空"));
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::validation("标题长度需在 160 字以内"));
    }
    Ok(trimmed.to_string())
}

fn normalize_worth(worth: Option<i64>) -> AppResult<i64> {
    let value = worth.unwrap_or(0);
    if !(0..=MAX_WORTH).contains(&value) {
        return Err(AppError::validation("任务分值需在 0 到 1000 之间"));
    }
    Ok(value)
}
