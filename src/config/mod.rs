//! Configuration parsing, validation, and rule-set loading.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

use crate::common::error::ConfigError;
use crate::common::types::{
    PatternType, Rule, RuleId, RuleKind, RuleOptions, DEFAULT_PRIORITY,
};
use crate::config::types::{split_commands, Config};

pub use parser::load_config;
pub use validate::validate_config;

/// Load a config file, apply environment overrides, and validate.
pub fn load_and_validate(path: &str) -> Result<Config, ConfigError> {
    let config = env::apply_env_overrides(load_config(path)?);
    validate_config(&config)?;
    Ok(config)
}

/// Build the runtime rule snapshot from a validated config.
///
/// Ids are assigned in declaration order (triggers, gags, aliases,
/// tickers), which is also the stable insertion order used to break
/// trigger priority ties.
pub fn build_rules(config: &Config) -> Vec<Rule> {
    let rules_config = match config.rules {
        Some(ref rules) => rules,
        None => return Vec::new(),
    };

    let mut rules = Vec::new();
    let mut next_id: RuleId = 1;
    let mut push = |rules: &mut Vec<Rule>, kind, commands, options| {
        let mut rule = Rule::new(next_id, kind, commands);
        rule.options = options;
        rules.push(rule);
        next_id += 1;
    };

    for trigger in rules_config.triggers.iter().flatten() {
        let pattern_type = trigger
            .pattern_type
            .as_deref()
            .and_then(PatternType::from_str)
            .unwrap_or(PatternType::Substring);
        push(
            &mut rules,
            RuleKind::Trigger {
                pattern: trigger.pattern.clone(),
                pattern_type,
                priority: trigger.priority.unwrap_or(DEFAULT_PRIORITY),
            },
            split_commands(&trigger.commands),
            RuleOptions {
                enabled: trigger.enabled.unwrap_or(true),
                ignore_case: trigger.ignore_case.unwrap_or(false),
                hidden: false,
            },
        );
    }

    for gag in rules_config.gags.iter().flatten() {
        push(
            &mut rules,
            RuleKind::Gag {
                pattern: gag.pattern.clone(),
                regex: gag.regex.unwrap_or(false),
            },
            Vec::new(),
            RuleOptions {
                enabled: gag.enabled.unwrap_or(true),
                ignore_case: gag.ignore_case.unwrap_or(false),
                hidden: false,
            },
        );
    }

    for alias in rules_config.aliases.iter().flatten() {
        push(
            &mut rules,
            RuleKind::Alias {
                name: alias.name.clone(),
            },
            split_commands(&alias.commands),
            RuleOptions {
                enabled: alias.enabled.unwrap_or(true),
                ignore_case: false,
                hidden: false,
            },
        );
    }

    for ticker in rules_config.tickers.iter().flatten() {
        push(
            &mut rules,
            RuleKind::Ticker {
                interval_secs: ticker.interval_secs,
            },
            split_commands(&ticker.commands),
            RuleOptions {
                enabled: ticker.enabled.unwrap_or(true),
                ignore_case: false,
                hidden: ticker.hidden.unwrap_or(false),
            },
        );
    }

    rules
}
