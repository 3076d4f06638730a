use chrono::Utc;
use tracing::{debug, warn};

use crate::db::repositories::point_entry_repository::{PointEntryRepository, PointEntryRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::point_entry::{EntryScope, PointEntryRecord, RemotePointEntry};
use crate::services::points_feed::EntryFeed;
use crate::utils::points::classify_entry;

/// Ingest of ledger entries replicated from the partner device.
///
/// The live mirror feed is the source of truth for on-screen totals;
/// writing the entry into the local ledger is best effort, and a failed
/// persist is logged and tolerated rather than surfaced. The two copies
/// can therefore diverge until the next successful ingest of the same id.
#[derive(Clone)]
pub struct SyncService {
    db: DbPool,
    mirror: EntryFeed,
}

impl SyncService {
    pub fn new(db: DbPool, mirror: EntryFeed) -> Self {
        Self { db, mirror }
    }

    pub fn mirror_feed(&self) -> &EntryFeed {
        &self.mirror
    }

    pub fn ingest_remote_entry(&self, remote: RemotePointEntry) -> AppResult<PointEntryRecord> {
        if remote.id.trim().is_empty() {
            return Err(AppError::validation("同步条目缺少 id"));
        }
        if remote.owner_id.trim().is_empty() {
            return Err(AppError::validation("同步条目缺少所有者"));
        }

        // The partner may run an older revision that never wrote an
        // authoritative scope; classify its shape once, here.
        let scope = remote
            .scope
            .as_deref()
            .and_then(EntryScope::parse)
            .unwrap_or_else(|| classify_entry(&remote.meta()));

        let record = PointEntryRecord {
            id: remote.id,
            owner_id: remote.owner_id,
            pair_id: remote.pair_id,
            value: remote.value,
            reason: remote.reason.unwrap_or_default(),
            task_id: remote.task_id,
            scope,
            kind: remote.kind,
            for_uid: remote.for_uid,
            created_at: remote
                .created_at
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        };

        let row = PointEntryRow::from_record(&record);
        if let Err(error) = self
            .db
            .with_connection(|conn| PointEntryRepository::upsert(conn, &row))
        {
            warn!(
                target: "app::sync",
                entry_id = %record.id,
                %error,
                "mirror persist failed, keeping feed copy only"
            );
        }

        self.mirror.publish(record.clone());
        debug!(
            target: "app::sync",
            entry_id = %record.id,
            scope = record.scope.as_str(),
            "remote entry ingested"
        );
        Ok(record)
    }

    /// The partner undid an entry; drop our copy.
    pub fn ingest_remote_removal(&self, pair_id: Option<&str>, id: &str) -> AppResult<()> {
        let key = pair_id.unwrap_or("");
        if let Err(error) = self
            .db
            .with_connection(|conn| PointEntryRepository::delete(conn, key, id).map(|_| ()))
        {
            warn!(
                target: "app::sync",
                entry_id = %id,
                %error,
                "mirror delete failed, retracting feed copy anyway"
            );
        }
        self.mirror.retract(id);
        Ok(())
    }
}
