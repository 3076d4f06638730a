use chrono::{DateTime, Duration, Utc};
use rusqlite::TransactionBehavior;
use tracing::info;

use crate::db::repositories::redemption_repository::RedemptionRepository;
use crate::db::repositories::reward_repository::RewardRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::point_entry::EntryScope;
use crate::models::reward::{
    RewardCreateInput, RewardRecord, RewardRedemptionRecord, RewardUpdateInput,
};
use crate::services::balance_service;

const MAX_TITLE_CHARS: usize = 80;

/// Seconds after redeeming during which the toast's undo action is honored.
pub const UNDO_WINDOW_SECS: i64 = 15;

#[derive(Clone)]
pub struct RewardService {
    db: DbPool,
}

impl RewardService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_reward(&self, input: RewardCreateInput) -> AppResult<RewardRecord> {
        let title = normalize_title(&input.title)?;
        let cost = normalize_cost(input.cost)?;
        if input.owner_id.trim().is_empty() {
            return Err(AppError::validation("奖励必须指定所有者"));
        }

        let now = Utc::now().to_rfc3339();
        let record = RewardRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: input.owner_id,
            pair_id: input.pair_id,
            title,
            cost,
            scope: input.scope.unwrap_or(EntryScope::Shared),
            created_at: now.clone(),
            updated_at: now,
        };

        self.db
            .with_connection(|conn| RewardRepository::insert(conn, &record))?;
        info!(target: "app::rewards", reward_id = %record.id, "reward created");
        Ok(record)
    }

    pub fn update_reward(&self, id: &str, update: RewardUpdateInput) -> AppResult<RewardRecord> {
        let mut existing = self.get_reward(id)?;
        if let Some(title) = update.title {
            existing.title = normalize_title(&title)?;
        }
        if let Some(cost) = update.cost {
            existing.cost = normalize_cost(cost)?;
        }
        if let Some(scope) = update.scope {
            existing.scope = scope;
        }
        existing.updated_at = Utc::now().to_rfc3339();

        self.db
            .with_connection(|conn| RewardRepository::update(conn, &existing))?;
        info!(target: "app::rewards", reward_id = %existing.id, "reward updated");
        Ok(existing)
    }

    pub fn delete_reward(&self, id: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| RewardRepository::delete(conn, id))?;
        info!(target: "app::rewards", reward_id = %id, "reward deleted");
        Ok(())
    }

    pub fn get_reward(&self, id: &str) -> AppResult<RewardRecord> {
        self.db
            .with_connection(|conn| RewardRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)
    }

    pub fn list_rewards(&self, pair_id: &str) -> AppResult<Vec<RewardRecord>> {
        self.db
            .with_connection(|conn| RewardRepository::list_for_pair(conn, pair_id))
    }

    /// Spend points on a reward.
    ///
    /// Balance check and redemption insert run inside one immediate
    /// transaction, so two devices redeeming against the same balance
    /// serialize: the second one re-reads the balance after the first
    /// committed and fails the check instead of overspending.
    pub fn redeem(&self, reward_id: &str, user_id: &str) -> AppResult<RewardRedemptionRecord> {
        if user_id.trim().is_empty() {
            return Err(AppError::validation("兑换必须指定用户"));
        }

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let reward =
            RewardRepository::find_by_id(&tx, reward_id)?.ok_or_else(AppError::not_found)?;
        let pair_id = reward.pair_id.clone().unwrap_or_default();

        let available = balance_service::scope_balance(&tx, &pair_id, reward.scope, user_id)?;
        if available < reward.cost {
            return Err(AppError::insufficient_points(
                reward.cost,
                available,
                reward.scope,
            ));
        }

        let record = RewardRedemptionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            reward_id: reward.id.clone(),
            title: reward.title.clone(),
            cost: reward.cost,
            scope: reward.scope,
            pair_id: reward.pair_id.clone(),
            redeemed_by: user_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        RedemptionRepository::insert(&tx, &record)?;
        tx.commit()?;

        info!(
            target: "app::rewards",
            redemption_id = %record.id,
            reward_id = %record.reward_id,
            cost = record.cost,
            "reward redeemed"
        );
        Ok(record)
    }

    /// Undo deletes the append-only record, but only while the toast is
    /// still plausibly on screen.
    pub fn undo_redemption(&self, id: &str) -> AppResult<()> {
        self.undo_redemption_at(id, Utc::now())
    }

    fn undo_redemption_at(&self, id: &str, now: DateTime<Utc>) -> AppResult<()> {
        let record = self
            .db
            .with_connection(|conn| RedemptionRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;

        let created = DateTime::parse_from_rfc3339(&record.created_at)
            .map_err(|_| AppError::database("非法的兑换时间戳"))?
            .with_timezone(&Utc);
        if now.signed_duration_since(created) > Duration::seconds(UNDO_WINDOW_SECS) {
            return Err(AppError::validation("撤销窗口已过, 无法撤销该兑换"));
        }

        self.db.with_connection(|conn| {
            RedemptionRepository::delete(conn, id)?;
            Ok(())
        })?;
        info!(target: "app::rewards", redemption_id = %id, "redemption undone");
        Ok(())
    }

    pub fn list_redemptions(&self, pair_id: &str) -> AppResult<Vec<RewardRedemptionRecord>> {
        self.db
            .with_connection(|conn| RedemptionRepository::list_for_pair(conn, pair_id))
    }
}

fn normalize_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("奖励标题不能为空"));
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::validation("奖励标题长度需在 80 字以内"));
    }
    Ok(trimmed.to_string())
}

fn normalize_cost(cost: i64) -> AppResult<i64> {
    if cost < 1 {
        return Err(AppError::validation("奖励成本至少为 1 分"));
    }
    Ok(cost)
}
