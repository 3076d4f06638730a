pub mod pair;
pub mod point_entry;
pub mod reward;
pub mod streak;
pub mod task;
