//! Shared types used across the application.
//!
//! The automation rule model: a rule is one immutable record whose kind
//! (trigger, gag, alias, ticker) carries the kind-specific fields. The
//! engine never mutates rules in place; match counters and timestamps come
//! back to the caller as [`RuleEffect`] records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Unique identifier for a rule.
pub type RuleId = u64;

/// How a trigger pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    /// Pattern appears anywhere in the line.
    Substring,
    /// `*` matches any span (captured), `?` matches exactly one character.
    Wildcard,
    /// Pattern is a regular expression; groups become capture variables.
    Regex,
    /// Line equals the pattern exactly.
    Exact,
    /// Line starts with the pattern.
    BeginsWith,
    /// Line ends with the pattern.
    EndsWith,
}

impl PatternType {
    /// Parse a pattern type from its config string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "substring" | "contains" => Some(Self::Substring),
            "wildcard" | "glob" => Some(Self::Wildcard),
            "regex" | "regexp" => Some(Self::Regex),
            "exact" => Some(Self::Exact),
            "begins_with" | "beginswith" | "prefix" => Some(Self::BeginsWith),
            "ends_with" | "endswith" | "suffix" => Some(Self::EndsWith),
            _ => None,
        }
    }
}

/// Per-rule option flags.
///
/// A rule with `enabled` false never matches or fires. Hidden tickers are
/// excluded from session startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOptions {
    pub enabled: bool,
    pub ignore_case: bool,
    pub hidden: bool,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_case: false,
            hidden: false,
        }
    }
}

/// Default trigger priority; lower fires first.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Kind-specific rule data.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// Fires commands when incoming text matches a pattern.
    Trigger {
        pattern: String,
        pattern_type: PatternType,
        /// Lower fires first; ties broken by stable insertion order.
        priority: i32,
    },
    /// Suppresses display of matching incoming text. Never fires commands.
    Gag {
        pattern: String,
        /// Substring match when false, regex when true.
        regex: bool,
    },
    /// Expands a short typed command into a longer command sequence.
    /// Name lookup is an exact, case-sensitive match on the first word.
    Alias { name: String },
    /// Fires commands on a fixed interval while connected.
    Ticker { interval_secs: f64 },
}

/// One automation rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub kind: RuleKind,
    /// Outbound command strings, dispatched in stored order.
    /// Semicolon-joined in persisted form, split on load.
    pub commands: Vec<String>,
    pub options: RuleOptions,
    /// Successful match count. Maintained by the caller from
    /// [`RuleEffect::Matched`] records; meaningful for triggers only.
    pub match_count: u64,
    pub last_modified: DateTime<Utc>,
}

impl Rule {
    /// Create an enabled rule with default options and a fresh timestamp.
    pub fn new(id: RuleId, kind: RuleKind, commands: Vec<String>) -> Self {
        Self {
            id,
            kind,
            commands,
            options: RuleOptions::default(),
            match_count: 0,
            last_modified: Utc::now(),
        }
    }
}

/// Captured substrings from a pattern match, keyed by position
/// ("1", "2", ...) plus "*" for the whole match.
pub type CaptureVariables = HashMap<String, String>;

/// Side effect produced during an evaluation pass.
///
/// The engine reads an immutable rule snapshot and reports state changes
/// here instead of mutating shared rules; the owner of the rule set applies
/// them and supplies the next snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEffect {
    /// The rule matched and fired; the owner should increment its
    /// `match_count` and refresh `last_modified`.
    Matched { rule_id: RuleId },
    /// The rule's pattern failed to compile; it was skipped for this line.
    InvalidPattern { rule_id: RuleId, message: String },
}

/// Result of evaluating one incoming line against the rule set.
#[derive(Debug, Clone, Default)]
pub struct LineOutcome {
    /// The line to display, or `None` when a gag suppressed it.
    pub display: Option<String>,
    /// Fired trigger commands, substitution applied, in dispatch order.
    pub commands: Vec<String>,
    /// Match-count increments and invalid-pattern conditions.
    pub effects: Vec<RuleEffect>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_type_parsing() {
        assert_eq!(PatternType::from_str("substring"), Some(PatternType::Substring));
        assert_eq!(PatternType::from_str("WILDCARD"), Some(PatternType::Wildcard));
        assert_eq!(PatternType::from_str("regexp"), Some(PatternType::Regex));
        assert_eq!(PatternType::from_str("begins_with"), Some(PatternType::BeginsWith));
        assert_eq!(PatternType::from_str("suffix"), Some(PatternType::EndsWith));
        assert_eq!(PatternType::from_str("bogus"), None);
    }

    #[test]
    fn test_new_rule_defaults() {
        let rule = Rule::new(
            7,
            RuleKind::Trigger {
                pattern: "hits you".to_string(),
                pattern_type: PatternType::Substring,
                priority: DEFAULT_PRIORITY,
            },
            vec!["flee".to_string()],
        );
        assert!(rule.options.enabled);
        assert!(!rule.options.ignore_case);
        assert_eq!(rule.match_count, 0);
    }
}
