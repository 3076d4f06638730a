pub mod pair_repository;
pub mod point_entry_repository;
pub mod redemption_repository;
pub mod reward_repository;
pub mod streak_repository;
pub mod task_repository;
