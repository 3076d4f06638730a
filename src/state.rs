use std::sync::Arc;

use crate::db::repositories::point_entry_repository::PointEntryRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::point_entry::EntryScope;
use crate::services::balance_service::BalanceService;
use crate::services::ledger_service::LedgerService;
use crate::services::pairing_service::PairingService;
use crate::services::points_feed::{
    AggregatorConfig, EntryFeed, EntrySource, PointsAggregator, TotalSink,
};
use crate::services::reward_service::RewardService;
use crate::services::streak_service::StreakService;
use crate::services::sync_service::SyncService;
use crate::services::task_service::TaskService;

/// One wired-up application core over a single database.
///
/// The local feed carries this device's ledger writes; the mirror feed
/// carries entries replicated from the partner device. Aggregators built by
/// the `watch_*` helpers subscribe to both.
#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    local_feed: EntryFeed,
    mirror_feed: EntryFeed,
    ledger_service: Arc<LedgerService>,
    balance_service: Arc<BalanceService>,
    reward_service: Arc<RewardService>,
    task_service: Arc<TaskService>,
    streak_service: Arc<StreakService>,
    pairing_service: Arc<PairingService>,
    sync_service: Arc<SyncService>,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> AppResult<Self> {
        let local_feed = EntryFeed::new();
        let mirror_feed = EntryFeed::new();

        // A feed only sees writes made after construction; seed it with the
        // persisted ledger so the first Reset a subscriber receives carries
        // entries from earlier runs, not an empty snapshot.
        let rows = db_pool.with_connection(PointEntryRepository::list_all)?;
        for row in rows {
            local_feed.publish(row.into_record());
        }

        let ledger_service = Arc::new(LedgerService::new(db_pool.clone(), local_feed.clone()));
        let balance_service = Arc::new(BalanceService::new(db_pool.clone()));
        let reward_service = Arc::new(RewardService::new(db_pool.clone()));
        let streak_service = Arc::new(StreakService::new(db_pool.clone()));
        let task_service = Arc::new(TaskService::new(
            db_pool.clone(),
            Arc::clone(&ledger_service),
            Arc::clone(&streak_service),
        ));
        let pairing_service = Arc::new(PairingService::new(db_pool.clone()));
        let sync_service = Arc::new(SyncService::new(db_pool.clone(), mirror_feed.clone()));

        Ok(Self {
            db_pool,
            local_feed,
            mirror_feed,
            ledger_service,
            balance_service,
            reward_service,
            task_service,
            streak_service,
            pairing_service,
            sync_service,
        })
    }

    pub fn db_pool(&self) -> &DbPool {
        &self.db_pool
    }

    pub fn ledger_service(&self) -> &Arc<LedgerService> {
        &self.ledger_service
    }

    pub fn balance_service(&self) -> &Arc<BalanceService> {
        &self.balance_service
    }

    pub fn reward_service(&self) -> &Arc<RewardService> {
        &self.reward_service
    }

    pub fn task_service(&self) -> &Arc<TaskService> {
        &self.task_service
    }

    pub fn streak_service(&self) -> &Arc<StreakService> {
        &self.streak_service
    }

    pub fn pairing_service(&self) -> &Arc<PairingService> {
        &self.pairing_service
    }

    pub fn sync_service(&self) -> &Arc<SyncService> {
        &self.sync_service
    }

    /// Live shared total for a pair. The caller keeps the aggregator alive
    /// for as long as the screen is mounted; dropping it detaches.
    pub fn watch_shared_total(&self, pair_id: &str, on_total: TotalSink) -> PointsAggregator {
        let mut aggregator = PointsAggregator::new(
            self.local_source(),
            Some(self.mirror_source()),
            AggregatorConfig {
                pair_id: Some(pair_id.to_string()),
                owner_id: None,
                scope: EntryScope::Shared,
                beneficiary: None,
            },
            on_total,
        );
        aggregator.start();
        aggregator
    }

    /// Live personal total credited to one partner.
    pub fn watch_personal_total(
        &self,
        pair_id: &str,
        user_id: &str,
        on_total: TotalSink,
    ) -> PointsAggregator {
        let mut aggregator = PointsAggregator::new(
            self.local_source(),
            Some(self.mirror_source()),
            AggregatorConfig {
                pair_id: Some(pair_id.to_string()),
                owner_id: None,
                scope: EntryScope::Personal,
                beneficiary: Some(user_id.to_string()),
            },
            on_total,
        );
        aggregator.start();
        aggregator
    }

    fn local_source(&self) -> Arc<dyn EntrySource> {
        Arc::new(self.local_feed.clone())
    }

    fn mirror_source(&self) -> Arc<dyn EntrySource> {
        Arc::new(self.mirror_feed.clone())
    }
}
