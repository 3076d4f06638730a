use chrono::Utc;
use rand::Rng;
use tracing::info;

use crate::db::repositories::pair_repository::PairRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::pair::PairRecord;

const INVITE_CODE_LEN: usize = 6;
// No 0/O/1/I: codes get read aloud or typed from the partner's screen.
const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const INVITE_CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct PairingService {
    db: DbPool,
}

impl PairingService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Open a pair with a fresh invite code for the partner to join with.
    pub fn create_pair(&self, user_id: &str) -> AppResult<PairRecord> {
        let user_id = normalize_user(user_id)?;
        if self.find_pair_for(&user_id)?.is_some() {
            return Err(AppError::conflict("该用户已在配对中"));
        }

        let mut last_error = None;
        for _ in 0..INVITE_CODE_ATTEMPTS {
            let record = PairRecord {
                id: uuid::Uuid::new_v4().to_string(),
                member_a: user_id.clone(),
                member_b: None,
                invite_code: generate_invite_code(),
                created_at: Utc::now().to_rfc3339(),
            };
            match self
                .db
                .with_connection(|conn| PairRepository::insert(conn, &record))
            {
                Ok(()) => {
                    info!(target: "app::pairing", pair_id = %record.id, "pair created");
                    return Ok(record);
                }
                // Invite code collision; roll a new one.
                Err(AppError::Conflict { .. }) => {
                    last_error = Some(AppError::conflict("邀请码冲突"));
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::other("生成邀请码失败")))
    }

    pub fn join_pair(&self, code: &str, user_id: &str) -> AppResult<PairRecord> {
        let user_id = normalize_user(user_id)?;
        let code = code.trim().to_uppercase();

        let mut pair = self
            .db
            .with_connection(|conn| PairRepository::find_by_invite_code(conn, &code))?
            .ok_or_else(|| AppError::validation("邀请码无效"))?;

        if pair.member_a == user_id {
            return Err(AppError::validation("不能与自己配对"));
        }
        if pair.member_b.is_some() {
            return Err(AppError::conflict("该配对已满员"));
        }
        if self.find_pair_for(&user_id)?.is_some() {
            return Err(AppError::conflict("该用户已在配对中"));
        }

        pair.member_b = Some(user_id.clone());
        self.db
            .with_connection(|conn| PairRepository::update_members(conn, &pair))?;
        info!(target: "app::pairing", pair_id = %pair.id, "partner joined pair");
        Ok(pair)
    }

    /// Detach one member. The remaining partner keeps the pair (and its
    /// shared history); an empty pair is deleted.
    pub fn unlink(&self, pair_id: &str, user_id: &str) -> AppResult<()> {
        let mut pair = self.get_pair(pair_id)?;
        if !pair.is_member(user_id) {
            return Err(AppError::validation("该用户不属于此配对"));
        }

        if pair.member_b.as_deref() == Some(user_id) {
            pair.member_b = None;
            self.db
                .with_connection(|conn| PairRepository::update_members(conn, &pair))?;
        } else if let Some(partner) = pair.member_b.take() {
            pair.member_a = partner;
            self.db
                .with_connection(|conn| PairRepository::update_members(conn, &pair))?;
        } else {
            self.db
                .with_connection(|conn| PairRepository::delete(conn, pair_id))?;
        }

        info!(target: "app::pairing", pair_id = %pair_id, user_id = %user_id, "member unlinked");
        Ok(())
    }

    pub fn get_pair(&self, pair_id: &str) -> AppResult<PairRecord> {
        self.db
            .with_connection(|conn| PairRepository::find_by_id(conn, pair_id))?
            .ok_or_else(AppError::not_found)
    }

    pub fn find_pair_for(&self, user_id: &str) -> AppResult<Option<PairRecord>> {
        self.db
            .with_connection(|conn| PairRepository::find_for_member(conn, user_id))
    }
}

fn normalize_user(user_id: &str) -> AppResult<String> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("用户 id 不能为空"));
    }
    Ok(trimmed.to_string())
}

fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..INVITE_CODE_ALPHABET.len());
            INVITE_CODE_ALPHABET[idx] as char
        })
        .collect()
}
