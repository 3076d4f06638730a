use chrono::NaiveDate;
use tracing::debug;

use crate::db::repositories::streak_repository::StreakRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::streak::StreakRecord;

const DATE_FMT: &str = "%Y-%m-%d";

/// Daily task-completion streak per pair. Any completion by either partner
/// counts for the day.
#[derive(Clone)]
pub struct StreakService {
    db: DbPool,
}

impl StreakService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn get_streak(&self, pair_id: &str) -> AppResult<StreakRecord> {
        let record = self
            .db
            .with_connection(|conn| StreakRepository::find_by_pair(conn, pair_id))?;
        Ok(record.unwrap_or_else(|| StreakRecord::empty(pair_id)))
    }

    pub fn record_activity(&self, pair_id: &str, day: NaiveDate) -> AppResult<StreakRecord> {
        self.db.with_connection(|conn| {
            let mut streak = StreakRepository::find_by_pair(conn, pair_id)?
                .unwrap_or_else(|| StreakRecord::empty(pair_id));

            let last = streak
                .last_active_date
                .as_deref()
                .and_then(|raw| NaiveDate::parse_from_str(raw, DATE_FMT).ok());

            match last {
                // Second completion on the same day changes nothing.
                Some(prev) if prev == day => return Ok(streak),
                // A completion dated before the recorded day can arrive from
                // a device with a skewed clock; ignore it.
                Some(prev) if day < prev => {
                    debug!(
                        target: "app::streaks",
                        pair_id = %pair_id,
                        "out-of-order activity ignored"
                    );
                    return Ok(streak);
                }
                Some(prev) if prev.succ_opt() == Some(day) => streak.current += 1,
                _ => streak.current = 1,
            }

            streak.longest = streak.longest.max(streak.current);
            streak.last_active_date = Some(day.format(DATE_FMT).to_string());
            StreakRepository::upsert(conn, &streak)?;
            Ok(streak)
        })
    }
}
