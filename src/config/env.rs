//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `MUDLARK_SERVER_HOST` - MUD server host
//! - `MUDLARK_SERVER_PORT` - MUD server port
//! - `MUDLARK_LOG_DIR` - session log directory

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "MUDLARK";

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(host) = env::var(format!("{}_SERVER_HOST", ENV_PREFIX)) {
        config.server.host = host;
    }
    if let Ok(port) = env::var(format!("{}_SERVER_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }
    if let Ok(dir) = env::var(format!("{}_LOG_DIR", ENV_PREFIX)) {
        config.logging.get_or_insert_with(Default::default).directory = Some(dir);
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `MUDLARK_CONFIG`, otherwise returns "mudlark.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "mudlark.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ServerConfig;

    fn make_test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "original.example.org".to_string(),
                port: 4000,
            },
            session: None,
            logging: None,
            rules: None,
        }
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("MUDLARK_CONFIG");
        assert_eq!(get_config_path(), "mudlark.conf");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("MUDLARK_SERVER_HOST");
        env::remove_var("MUDLARK_SERVER_PORT");

        let result = apply_env_overrides(make_test_config());
        assert_eq!(result.server.host, "original.example.org");
        assert_eq!(result.server.port, 4000);
    }
}
