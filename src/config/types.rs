//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub session: Option<SessionConfig>,
    pub logging: Option<LoggingConfig>,
    pub rules: Option<RulesConfig>,
}

/// MUD server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Session behavior settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionConfig {
    /// Prefix logged lines with a timestamp.
    pub timestamps: Option<bool>,
    /// Keep a raw log of locally sent commands.
    pub log_commands: Option<bool>,
}

/// Session log settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Directory for session logs.
    pub directory: Option<String>,
    /// Rotate the active log once it reaches this size.
    pub max_file_bytes: Option<u64>,
    /// Run the rotation check on roughly 1 in N lines.
    pub rotation_sample: Option<u32>,
}

/// The persisted rule set.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RulesConfig {
    pub triggers: Option<Vec<TriggerConfig>>,
    pub gags: Option<Vec<GagConfig>>,
    pub aliases: Option<Vec<AliasConfig>>,
    pub tickers: Option<Vec<TickerConfig>>,
}

/// A trigger rule as persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Match text; interpretation depends on `pattern_type`.
    pub pattern: String,
    /// One of: substring, wildcard, regex, exact, begins_with, ends_with.
    /// Defaults to substring.
    pub pattern_type: Option<String>,
    /// Semicolon-joined command list.
    pub commands: String,
    /// Lower fires first. Defaults to 50.
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
    pub ignore_case: Option<bool>,
}

/// A gag rule as persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct GagConfig {
    pub pattern: String,
    /// Treat the pattern as a regex instead of a substring.
    pub regex: Option<bool>,
    pub enabled: Option<bool>,
    pub ignore_case: Option<bool>,
}

/// An alias as persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct AliasConfig {
    /// The short command name; matched exactly and case-sensitively.
    pub name: String,
    /// Semicolon-joined command list.
    pub commands: String,
    pub enabled: Option<bool>,
}

/// A ticker as persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerConfig {
    /// Firing period in seconds; must be positive.
    pub interval_secs: f64,
    /// Semicolon-joined command list.
    pub commands: String,
    pub enabled: Option<bool>,
    /// Hidden tickers are not started with the session.
    pub hidden: Option<bool>,
}

/// Split a semicolon-joined command string into its persisted command
/// list, dropping empty segments.
pub fn split_commands(commands: &str) -> Vec<String> {
    commands
        .split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_commands() {
        assert_eq!(
            split_commands("wield sword;kill $1$"),
            vec!["wield sword", "kill $1$"]
        );
        assert_eq!(split_commands("look"), vec!["look"]);
        assert_eq!(split_commands("a ; ;b;"), vec!["a", "b"]);
        assert!(split_commands("").is_empty());
    }
}
