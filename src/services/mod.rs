pub mod balance_service;
pub mod ledger_service;
pub mod pairing_service;
pub mod points_feed;
pub mod reward_service;
pub mod streak_service;
pub mod sync_service;
pub mod task_service;
