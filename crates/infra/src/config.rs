//! Environment-driven application configuration.

use chrono::Duration;
use thiserror::Error;

use addressbook_auth::TokenSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Postgres connection string; `Some` only when persistent stores are on.
    pub database_url: Option<String>,
    pub tokens: TokenSettings,
    /// Usernames that receive the `admin` role on registration.
    pub bootstrap_admins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            tokens: TokenSettings::default(),
            bootstrap_admins: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let use_persistent = match get("USE_PERSISTENT_STORES") {
            None => false,
            Some(v) => parse_flag("USE_PERSISTENT_STORES", &v)?,
        };
        let database_url = if use_persistent {
            Some(get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?)
        } else {
            None
        };

        let access_minutes = parse_number("ACCESS_TOKEN_MINUTES", get("ACCESS_TOKEN_MINUTES"), 15, 24 * 60)?;
        let refresh_days = parse_number("REFRESH_TOKEN_DAYS", get("REFRESH_TOKEN_DAYS"), 7, 365)?;

        let tokens = TokenSettings {
            secret: get("JWT_SECRET"),
            issuer: get("JWT_ISSUER").unwrap_or(defaults.tokens.issuer),
            audience: get("JWT_AUDIENCE").unwrap_or(defaults.tokens.audience),
            access_token_ttl: Duration::minutes(access_minutes),
            refresh_token_ttl: Duration::days(refresh_days),
        };

        let bootstrap_admins = get("BOOTSTRAP_ADMINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url,
            tokens,
            bootstrap_admins,
        })
    }

    pub fn use_persistent_stores(&self) -> bool {
        self.database_url.is_some()
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}

/// Positive integer in `1..=max`, or `default` when unset.
fn parse_number(
    var: &'static str,
    value: Option<String>,
    default: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<i64>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert!(!cfg.use_persistent_stores());
        assert_eq!(cfg.tokens.secret, None);
        assert_eq!(cfg.tokens.issuer, "addressbook");
        assert_eq!(cfg.tokens.audience, "addressbook-clients");
        assert_eq!(cfg.tokens.access_token_ttl, Duration::minutes(15));
        assert_eq!(cfg.tokens.refresh_token_ttl, Duration::days(7));
        assert!(cfg.bootstrap_admins.is_empty());
    }

    #[test]
    fn persistent_stores_require_database_url() {
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );

        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/addressbook"),
        ])
        .unwrap();
        assert!(cfg.use_persistent_stores());
    }

    #[test]
    fn reads_token_settings_and_admin_list() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_ISSUER", "issuer"),
            ("ACCESS_TOKEN_MINUTES", "5"),
            ("REFRESH_TOKEN_DAYS", "30"),
            ("BOOTSTRAP_ADMINS", " root, ,ops "),
        ])
        .unwrap();

        assert_eq!(cfg.tokens.secret.as_deref(), Some("s3cret"));
        assert_eq!(cfg.tokens.issuer, "issuer");
        assert_eq!(cfg.tokens.access_token_ttl, Duration::minutes(5));
        assert_eq!(cfg.tokens.refresh_token_ttl, Duration::days(30));
        assert_eq!(cfg.bootstrap_admins, vec!["root".to_string(), "ops".to_string()]);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert!(matches!(
            config(&[("ACCESS_TOKEN_MINUTES", "soon")]),
            Err(ConfigError::Invalid { var: "ACCESS_TOKEN_MINUTES", .. })
        ));
        assert!(matches!(
            config(&[("REFRESH_TOKEN_DAYS", "0")]),
            Err(ConfigError::Invalid { var: "REFRESH_TOKEN_DAYS", .. })
        ));
        assert!(matches!(
            config(&[("USE_PERSISTENT_STORES", "maybe")]),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
