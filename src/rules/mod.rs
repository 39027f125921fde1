//! The automation rule engine: pattern matching, line evaluation, and
//! ticker scheduling.

pub mod engine;
pub mod matcher;
pub mod ticker;

pub use engine::RuleEngine;
pub use ticker::{TickerHandle, TickerScheduler};
