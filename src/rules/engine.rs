//! The automation rule engine.
//!
//! Holds a compiled, immutable snapshot of the rule set and classifies
//! each incoming line: gags decide whether the line is displayed, triggers
//! fire substituted command lists in priority order, and aliases expand
//! outgoing user commands. The engine never mutates rules; match counters
//! come back as [`RuleEffect`] records for the snapshot owner to apply.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::common::types::{
    CaptureVariables, LineOutcome, PatternType, Rule, RuleEffect, RuleId, RuleKind,
};
use crate::rules::matcher::{substitute, CompiledPattern};

/// A compiled gag or trigger with its owning rule's fields.
#[derive(Debug, Clone)]
struct CompiledRule {
    id: RuleId,
    pattern: CompiledPattern,
    commands: Vec<String>,
    priority: i32,
}

/// Rule engine built from one rule snapshot.
///
/// Rebuild the engine when the rule set changes; evaluation itself never
/// modifies it.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    /// Enabled gags, insertion order.
    gags: Vec<CompiledRule>,
    /// Enabled triggers, sorted by ascending priority; ties keep
    /// insertion order (stable sort).
    triggers: Vec<CompiledRule>,
    /// Enabled aliases keyed by name. First definition of a name wins.
    aliases: HashMap<String, Vec<String>>,
    /// Enabled rules whose pattern failed to compile, reported as an
    /// invalid-pattern condition on every evaluation pass that skips them.
    invalid: Vec<(RuleId, String)>,
}

impl RuleEngine {
    /// Compile an engine from a rule snapshot.
    ///
    /// Disabled rules are dropped entirely. Rules with empty or invalid
    /// patterns are excluded from matching and surfaced through
    /// [`RuleEffect::InvalidPattern`].
    pub fn from_snapshot(rules: &[Rule]) -> Self {
        let mut engine = Self::default();

        for rule in rules {
            if !rule.options.enabled {
                continue;
            }

            match &rule.kind {
                RuleKind::Trigger {
                    pattern,
                    pattern_type,
                    priority,
                } => {
                    if let Some(compiled) =
                        engine.compile(rule.id, pattern, *pattern_type, rule.options.ignore_case)
                    {
                        engine.triggers.push(CompiledRule {
                            id: rule.id,
                            pattern: compiled,
                            commands: rule.commands.clone(),
                            priority: *priority,
                        });
                    }
                }
                RuleKind::Gag { pattern, regex } => {
                    let pattern_type = if *regex {
                        PatternType::Regex
                    } else {
                        PatternType::Substring
                    };
                    if let Some(compiled) =
                        engine.compile(rule.id, pattern, pattern_type, rule.options.ignore_case)
                    {
                        engine.gags.push(CompiledRule {
                            id: rule.id,
                            pattern: compiled,
                            commands: Vec::new(),
                            priority: 0,
                        });
                    }
                }
                RuleKind::Alias { name } => {
                    if name.is_empty() {
                        engine
                            .invalid
                            .push((rule.id, "alias name is empty".to_string()));
                        continue;
                    }
                    engine
                        .aliases
                        .entry(name.clone())
                        .or_insert_with(|| rule.commands.clone());
                }
                // Tickers are interval-driven; the scheduler owns them.
                RuleKind::Ticker { .. } => {}
            }
        }

        engine.triggers.sort_by_key(|t| t.priority);
        engine
    }

    fn compile(
        &mut self,
        id: RuleId,
        pattern: &str,
        pattern_type: PatternType,
        ignore_case: bool,
    ) -> Option<CompiledPattern> {
        if pattern.is_empty() {
            self.invalid.push((id, "pattern is empty".to_string()));
            return None;
        }
        match CompiledPattern::compile(pattern, pattern_type, ignore_case) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                warn!("Skipping rule {}: {}", id, e);
                self.invalid.push((id, e.message));
                None
            }
        }
    }

    /// Evaluate one incoming line.
    ///
    /// Gag phase first: any matching gag suppresses display (gags never
    /// fire commands). Trigger phase second: every matching trigger fires,
    /// in ascending priority order with ties broken by insertion order;
    /// there is no early exit, so layered automation on one line works.
    /// A gagged line still runs the trigger phase - gags affect display
    /// only.
    pub fn evaluate(&self, line: &str) -> LineOutcome {
        let mut outcome = LineOutcome::default();

        for (id, message) in &self.invalid {
            outcome.effects.push(RuleEffect::InvalidPattern {
                rule_id: *id,
                message: message.clone(),
            });
        }

        let gagged = self.gags.iter().any(|g| g.pattern.is_match(line));
        if gagged {
            debug!("Line gagged: {}", line);
        }

        for trigger in &self.triggers {
            if !trigger.pattern.is_match(line) {
                continue;
            }

            outcome.effects.push(RuleEffect::Matched {
                rule_id: trigger.id,
            });

            let captures = trigger.pattern.captures(line);
            for command in &trigger.commands {
                outcome.commands.push(substitute(command, &captures));
            }
        }

        outcome.display = if gagged { None } else { Some(line.to_string()) };
        outcome
    }

    /// Expand a typed command through the alias table.
    ///
    /// The command splits on its first whitespace into head and rest; an
    /// enabled alias whose name equals head (case-sensitive) replaces the
    /// command with its expansion, substituting `$1`..`$N` from the
    /// whitespace-split tokens of rest and `$*` from the entirety of rest.
    /// Exactly one expansion level is applied; expansions are returned
    /// verbatim and are never re-expanded.
    pub fn expand_alias(&self, input: &str) -> Vec<String> {
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest),
            None => (input, ""),
        };

        let commands = match self.aliases.get(head) {
            Some(commands) => commands,
            None => return vec![input.to_string()],
        };

        let mut captures = CaptureVariables::new();
        captures.insert("*".to_string(), rest.to_string());
        for (i, token) in rest.split_whitespace().enumerate() {
            captures.insert((i + 1).to_string(), token.to_string());
        }

        commands
            .iter()
            .map(|command| substitute(command, &captures))
            .collect()
    }

    /// Number of enabled triggers in the snapshot.
    #[allow(dead_code)]
    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Rules excluded from matching because their pattern failed to
    /// compile.
    #[allow(dead_code)]
    pub fn invalid_rules(&self) -> &[(RuleId, String)] {
        &self.invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{RuleOptions, DEFAULT_PRIORITY};

    fn trigger(id: RuleId, pattern: &str, priority: i32, commands: &[&str]) -> Rule {
        Rule::new(
            id,
            RuleKind::Trigger {
                pattern: pattern.to_string(),
                pattern_type: PatternType::Substring,
                priority,
            },
            commands.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn wildcard_trigger(id: RuleId, pattern: &str, commands: &[&str]) -> Rule {
        Rule::new(
            id,
            RuleKind::Trigger {
                pattern: pattern.to_string(),
                pattern_type: PatternType::Wildcard,
                priority: DEFAULT_PRIORITY,
            },
            commands.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn gag(id: RuleId, pattern: &str) -> Rule {
        Rule::new(
            id,
            RuleKind::Gag {
                pattern: pattern.to_string(),
                regex: false,
            },
            Vec::new(),
        )
    }

    fn alias(id: RuleId, name: &str, commands: &[&str]) -> Rule {
        Rule::new(
            id,
            RuleKind::Alias {
                name: name.to_string(),
            },
            commands.iter().map(|c| c.to_string()).collect(),
        )
    }

    #[test]
    fn test_plain_line_passes_through() {
        let engine = RuleEngine::from_snapshot(&[]);
        let outcome = engine.evaluate("nothing special");

        assert_eq!(outcome.display.as_deref(), Some("nothing special"));
        assert!(outcome.commands.is_empty());
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn test_trigger_fires_with_substitution() {
        let rules = vec![wildcard_trigger(1, "* tells you *", &["reply $1 I heard: $2"])];
        let engine = RuleEngine::from_snapshot(&rules);

        let outcome = engine.evaluate("Bob tells you hello");
        assert_eq!(outcome.commands, vec!["reply Bob I heard: hello"]);
        assert_eq!(outcome.effects, vec![RuleEffect::Matched { rule_id: 1 }]);
    }

    #[test]
    fn test_priority_order_and_match_effects() {
        let rules = vec![
            trigger(1, "combat", 20, &["second"]),
            trigger(2, "combat", 10, &["first"]),
        ];
        let engine = RuleEngine::from_snapshot(&rules);

        let outcome = engine.evaluate("combat begins");
        assert_eq!(outcome.commands, vec!["first", "second"]);

        // Each trigger's match is reported exactly once
        let matched: Vec<_> = outcome
            .effects
            .iter()
            .filter(|e| matches!(e, RuleEffect::Matched { .. }))
            .collect();
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_priority_tie_keeps_insertion_order() {
        let rules = vec![
            trigger(1, "hit", DEFAULT_PRIORITY, &["one"]),
            trigger(2, "hit", DEFAULT_PRIORITY, &["two"]),
        ];
        let engine = RuleEngine::from_snapshot(&rules);

        let outcome = engine.evaluate("a hit lands");
        assert_eq!(outcome.commands, vec!["one", "two"]);
    }

    #[test]
    fn test_no_early_exit_on_first_match() {
        let rules = vec![
            trigger(1, "dragon", 10, &["flee"]),
            trigger(2, "dragon", 20, &["log dragon sighting"]),
        ];
        let engine = RuleEngine::from_snapshot(&rules);

        let outcome = engine.evaluate("A dragon arrives.");
        assert_eq!(outcome.commands.len(), 2);
    }

    #[test]
    fn test_disabled_rule_never_fires() {
        let mut rule = trigger(1, "hit", DEFAULT_PRIORITY, &["ouch"]);
        rule.options = RuleOptions {
            enabled: false,
            ..RuleOptions::default()
        };
        let engine = RuleEngine::from_snapshot(&[rule]);

        let outcome = engine.evaluate("a hit lands");
        assert!(outcome.commands.is_empty());
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn test_gag_suppresses_display() {
        let engine = RuleEngine::from_snapshot(&[gag(1, "spams")]);

        let outcome = engine.evaluate("Bob spams the channel");
        assert_eq!(outcome.display, None);
    }

    #[test]
    fn test_gag_does_not_stop_triggers() {
        let rules = vec![
            gag(1, "combat"),
            trigger(2, "combat", DEFAULT_PRIORITY, &["drink potion"]),
        ];
        let engine = RuleEngine::from_snapshot(&rules);

        let outcome = engine.evaluate("combat spam line");
        assert_eq!(outcome.display, None);
        assert_eq!(outcome.commands, vec!["drink potion"]);
    }

    #[test]
    fn test_gag_regex_pattern() {
        let rules = vec![Rule::new(
            1,
            RuleKind::Gag {
                pattern: r"^\[auction\]".to_string(),
                regex: true,
            },
            Vec::new(),
        )];
        let engine = RuleEngine::from_snapshot(&rules);

        assert_eq!(engine.evaluate("[auction] sword for sale").display, None);
        assert!(engine.evaluate("no auction here").display.is_some());
    }

    #[test]
    fn test_invalid_pattern_skipped_and_reported() {
        let rules = vec![
            Rule::new(
                1,
                RuleKind::Trigger {
                    pattern: "[invalid".to_string(),
                    pattern_type: PatternType::Regex,
                    priority: DEFAULT_PRIORITY,
                },
                vec!["never".to_string()],
            ),
            trigger(2, "valid", DEFAULT_PRIORITY, &["fires"]),
        ];
        let engine = RuleEngine::from_snapshot(&rules);

        let outcome = engine.evaluate("valid line");
        // The valid rule still fires
        assert_eq!(outcome.commands, vec!["fires"]);
        // The broken rule is surfaced with its id
        assert!(outcome
            .effects
            .iter()
            .any(|e| matches!(e, RuleEffect::InvalidPattern { rule_id: 1, .. })));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let engine = RuleEngine::from_snapshot(&[trigger(1, "", DEFAULT_PRIORITY, &["boom"])]);

        let outcome = engine.evaluate("anything");
        assert!(outcome.commands.is_empty());
        assert!(outcome
            .effects
            .iter()
            .any(|e| matches!(e, RuleEffect::InvalidPattern { rule_id: 1, .. })));
    }

    #[test]
    fn test_alias_expansion() {
        let engine =
            RuleEngine::from_snapshot(&[alias(1, "k", &["wield sword", "kill $1$"])]);

        assert_eq!(
            engine.expand_alias("k orc"),
            vec!["wield sword", "kill orc"]
        );
    }

    #[test]
    fn test_alias_whole_rest() {
        let engine = RuleEngine::from_snapshot(&[alias(1, "gt", &["tell guild $*"])]);

        assert_eq!(
            engine.expand_alias("gt hello everyone"),
            vec!["tell guild hello everyone"]
        );
    }

    #[test]
    fn test_alias_is_case_sensitive() {
        let engine = RuleEngine::from_snapshot(&[alias(1, "k", &["kill $1"])]);

        assert_eq!(engine.expand_alias("K orc"), vec!["K orc"]);
    }

    #[test]
    fn test_unknown_command_unchanged() {
        let engine = RuleEngine::from_snapshot(&[alias(1, "k", &["kill $1"])]);

        assert_eq!(engine.expand_alias("look around"), vec!["look around"]);
    }

    #[test]
    fn test_alias_no_args() {
        let engine = RuleEngine::from_snapshot(&[alias(1, "af", &["say I am afk $1"])]);

        // No rest: $* is empty, $1 has no token and stays literal
        assert_eq!(engine.expand_alias("af"), vec!["say I am afk $1"]);
    }

    #[test]
    fn test_disabled_alias_ignored() {
        let mut rule = alias(1, "k", &["kill $1"]);
        rule.options.enabled = false;
        let engine = RuleEngine::from_snapshot(&[rule]);

        assert_eq!(engine.expand_alias("k orc"), vec!["k orc"]);
    }

    #[test]
    fn test_single_expansion_level() {
        let rules = vec![
            alias(1, "a", &["b deep"]),
            alias(2, "b", &["say should not expand"]),
        ];
        let engine = RuleEngine::from_snapshot(&rules);

        // "a" expands to "b deep" and stops; "b" is not re-expanded
        assert_eq!(engine.expand_alias("a"), vec!["b deep"]);
    }
}
