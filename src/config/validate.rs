//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.
//! Rule invariants (non-empty patterns, positive ticker intervals) are
//! enforced here, before the rule set reaches the engine or scheduler.

use crate::common::error::ConfigError;
use crate::common::types::PatternType;
use crate::config::types::{split_commands, Config};

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Validate server config
    if config.server.host.is_empty() {
        errors.push("server.host is required".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must be non-zero".to_string());
    }

    // Validate logging config
    if let Some(ref logging) = config.logging {
        if logging.max_file_bytes == Some(0) {
            errors.push("logging.max_file_bytes must be non-zero".to_string());
        }
        if logging.rotation_sample == Some(0) {
            errors.push("logging.rotation_sample must be at least 1".to_string());
        }
    }

    let rules = match config.rules {
        Some(ref rules) => rules,
        None => return finish(errors),
    };

    // Validate triggers
    for (i, trigger) in rules.triggers.iter().flatten().enumerate() {
        if trigger.pattern.is_empty() {
            errors.push(format!("rules.triggers[{}].pattern is required", i));
        }
        if let Some(ref pattern_type) = trigger.pattern_type {
            if PatternType::from_str(pattern_type).is_none() {
                errors.push(format!(
                    "rules.triggers[{}].pattern_type '{}' is invalid (use: substring, wildcard, regex, exact, begins_with, ends_with)",
                    i, pattern_type
                ));
            } else if PatternType::from_str(pattern_type) == Some(PatternType::Regex)
                && fancy_regex::Regex::new(&trigger.pattern).is_err()
            {
                errors.push(format!(
                    "rules.triggers[{}].pattern is not a valid regex: '{}'",
                    i, trigger.pattern
                ));
            }
        }
        if split_commands(&trigger.commands).is_empty() {
            errors.push(format!("rules.triggers[{}].commands is required", i));
        }
    }

    // Validate gags
    for (i, gag) in rules.gags.iter().flatten().enumerate() {
        if gag.pattern.is_empty() {
            errors.push(format!("rules.gags[{}].pattern is required", i));
        } else if gag.regex.unwrap_or(false) && fancy_regex::Regex::new(&gag.pattern).is_err() {
            errors.push(format!(
                "rules.gags[{}].pattern is not a valid regex: '{}'",
                i, gag.pattern
            ));
        }
    }

    // Validate aliases
    for (i, alias) in rules.aliases.iter().flatten().enumerate() {
        if alias.name.is_empty() {
            errors.push(format!("rules.aliases[{}].name is required", i));
        }
        if alias.name.contains(char::is_whitespace) {
            errors.push(format!(
                "rules.aliases[{}].name must not contain whitespace",
                i
            ));
        }
        if split_commands(&alias.commands).is_empty() {
            errors.push(format!("rules.aliases[{}].commands is required", i));
        }
    }

    // Validate tickers
    for (i, ticker) in rules.tickers.iter().flatten().enumerate() {
        if !ticker.interval_secs.is_finite() || ticker.interval_secs <= 0.0 {
            errors.push(format!(
                "rules.tickers[{}].interval_secs must be positive (got {})",
                i, ticker.interval_secs
            ));
        }
        if split_commands(&ticker.commands).is_empty() {
            errors.push(format!("rules.tickers[{}].commands is required", i));
        }
    }

    finish(errors)
}

fn finish(errors: Vec<String>) -> Result<(), ConfigError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
