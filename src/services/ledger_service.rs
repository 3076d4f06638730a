use chrono::Utc;
use tracing::{debug, info};

use crate::db::repositories::point_entry_repository::{PointEntryRepository, PointEntryRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::point_entry::{EntryMeta, EntryScope, PointEntryCreateInput, PointEntryRecord};
use crate::services::points_feed::EntryFeed;
use crate::utils::points::classify_entry;

const MAX_REASON_CHARS: usize = 140;

/// Append-only point ledger. Every committed write is also published to the
/// local entry feed so live totals update without re-querying.
#[derive(Clone)]
pub struct LedgerService {
    db: DbPool,
    feed: EntryFeed,
}

impl LedgerService {
    pub fn new(db: DbPool, feed: EntryFeed) -> Self {
        Self { db, feed }
    }

    pub fn feed(&self) -> &EntryFeed {
        &self.feed
    }

    pub fn award_points(&self, input: PointEntryCreateInput) -> AppResult<PointEntryRecord> {
        let record = build_entry_from_input(input)?;

        let row = PointEntryRow::from_record(&record);
        self.db
            .with_connection(|conn| PointEntryRepository::insert(conn, &row))?;
        self.feed.publish(record.clone());
        info!(
            target: "app::points",
            entry_id = %record.id,
            value = record.value,
            scope = record.scope.as_str(),
            "point entry recorded"
        );
        Ok(record)
    }

    /// Undo is a plain delete; entries are never edited in place.
    pub fn undo_entry(&self, pair_id: Option<&str>, id: &str) -> AppResult<()> {
        let key = pair_id.unwrap_or("");
        let removed = self
            .db
            .with_connection(|conn| PointEntryRepository::delete(conn, key, id))?;
        if !removed {
            return Err(AppError::not_found());
        }
        self.feed.retract(id);
        info!(target: "app::points", entry_id = %id, "point entry undone");
        Ok(())
    }

    pub fn list_entries(&self, pair_id: &str) -> AppResult<Vec<PointEntryRecord>> {
        let rows = self
            .db
            .with_connection(|conn| PointEntryRepository::list_for_pair(conn, pair_id))?;
        let entries = rows.into_iter().map(PointEntryRow::into_record).collect();
        Ok(entries)
    }

    pub fn entry_for_task(&self, task_id: &str) -> AppResult<Option<PointEntryRecord>> {
        let row = self
            .db
            .with_connection(|conn| PointEntryRepository::find_by_task(conn, task_id))?;
        debug!(target: "app::points", task_id = %task_id, found = row.is_some(), "task entry lookup");
        Ok(row.map(PointEntryRow::into_record))
    }
}

fn build_entry_from_input(mut input: PointEntryCreateInput) -> AppResult<PointEntryRecord> {
    if input.owner_id.trim().is_empty() {
        return Err(AppError::validation("积分条目必须指定所有者"));
    }
    if input.value <= 0 {
        return Err(AppError::validation("积分值需大于 0"));
    }

    let reason = input
        .reason
        .take()
        .map(|value| value.trim().to_string())
        .unwrap_or_default();
    if reason.chars().count() > MAX_REASON_CHARS {
        return Err(AppError::validation("积分原因长度需在 140 字以内"));
    }

    // Scope is authoritative from here on; the classification cascade only
    // fills the gap when the caller did not say.
    let scope = input.scope.take().unwrap_or_else(|| {
        classify_entry(&EntryMeta {
            reason: Some(reason.clone()),
            scope: None,
            kind: None,
            for_uid: input.for_uid.clone(),
        })
    });

    if scope == EntryScope::Personal && input.for_uid.as_deref().map_or(true, str::is_empty) {
        return Err(AppError::validation("个人积分必须指定受益人"));
    }

    Ok(PointEntryRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: input.owner_id,
        pair_id: input.pair_id,
        value: input.value,
        reason,
        task_id: input.task_id,
        scope,
        kind: None,
        for_uid: input.for_uid,
        created_at: Utc::now().to_rfc3339(),
    })
}
