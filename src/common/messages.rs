//! Canonical message types for session communication.
//!
//! This module defines the single source of truth for the messages passed
//! between the session pipeline, the display surface, the scheduler, and
//! the outbound writer.

use chrono::{DateTime, Utc};

use crate::common::types::RuleEffect;

/// A processed line ready for the display surface.
///
/// Gagged lines never reach this type; the recorder sees the same lines
/// the display does.
#[derive(Debug, Clone)]
pub struct DisplayLine {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl DisplayLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Where an outbound command originated.
///
/// Dispatch order is enqueue order regardless of source; the tag exists for
/// logging and for the command log (only user-typed lines are recorded
/// there).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// Typed by the local user (already alias-expanded).
    User,
    /// Fired by a trigger rule.
    Trigger,
    /// Fired by a ticker rule.
    Ticker,
}

/// A command string on its way to the server.
#[derive(Debug, Clone)]
pub struct OutboundCommand {
    pub text: String,
    pub source: CommandSource,
}

impl OutboundCommand {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: CommandSource::User,
        }
    }

    pub fn trigger(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: CommandSource::Trigger,
        }
    }

    pub fn ticker(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: CommandSource::Ticker,
        }
    }
}

/// Rule side effects reported out of an evaluation pass, batched per line.
///
/// The owner of the rule set (configuration layer, or an editing UI)
/// applies these to its copy of the rules.
#[derive(Debug, Clone)]
pub struct EffectBatch {
    pub effects: Vec<RuleEffect>,
}
