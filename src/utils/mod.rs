pub mod logger;
pub mod points;
