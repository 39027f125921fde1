//! Common utilities and types shared across the application.

pub mod error;
pub mod messages;
pub mod types;

// Re-export message types from messages module
pub use messages::{CommandSource, DisplayLine, OutboundCommand};

// Re-export the rule model
pub use types::{
    CaptureVariables, LineOutcome, PatternType, Rule, RuleEffect, RuleId, RuleKind, RuleOptions,
};
