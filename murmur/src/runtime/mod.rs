pub mod commands;
pub mod executor;
pub mod scripts;

pub use commands::{CommitPlan, VersionGuard, WriteCommand};
pub use executor::{CommitExecutor, RedisExecutor, execute_commit};
