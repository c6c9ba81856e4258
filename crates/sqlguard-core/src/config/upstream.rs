//! Warehouse connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;

/// Where the Postgres executor connects.
///
/// The URL comes from the first source that yields one: the environment
/// variable named by `url_env`, the literal `url`, then the discrete fields.
/// Passwords are only ever read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_url_env", skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_user")]
    pub user: String,

    /// Environment variable holding the password for `user`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// `sslmode` connection parameter, e.g. `require` for hosted Postgres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a query may wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            url: None,
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password_env: None,
            ssl_mode: None,
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout_seconds(),
        }
    }
}

impl UpstreamConfig {
    /// Resolve the connection URL.
    ///
    /// A named `password_env` that is not set is an error rather than a
    /// password-less login attempt.
    pub fn connection_string(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.url_env.as_deref().and_then(|var| std::env::var(var).ok()) {
            return Ok(url);
        }
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let credentials = match &self.password_env {
            Some(var) => {
                let password = std::env::var(var).map_err(|_| {
                    ConfigError::Config(format!("password variable {var} is not set"))
                })?;
                format!("{}:{password}", self.user)
            }
            None => self.user.clone(),
        };

        let mut url = format!(
            "postgresql://{credentials}@{}:{}/{}",
            self.host, self.port, self.database
        );
        if let Some(mode) = &self.ssl_mode {
            url = format!("{url}?sslmode={mode}");
        }
        Ok(url)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    /// `host:port/database`, for logs. Never includes credentials.
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(_) => "configured url".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

fn default_url_env() -> Option<String> {
    Some("DATABASE_URL".to_string())
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "retail_erp".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_seconds() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_only() -> UpstreamConfig {
        UpstreamConfig {
            url_env: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_url_from_fields() {
        let config = UpstreamConfig {
            database: "warehouse".to_string(),
            user: "analyst".to_string(),
            ssl_mode: Some("require".to_string()),
            ..fields_only()
        };
        assert_eq!(
            config.connection_string().unwrap(),
            "postgresql://analyst@localhost:5432/warehouse?sslmode=require"
        );
        assert_eq!(config.display_target(), "localhost:5432/warehouse");
    }

    #[test]
    fn test_unset_url_env_falls_through_to_url() {
        let config = UpstreamConfig {
            url_env: Some("SQLGUARD_TEST_URL_THAT_IS_NOT_SET".to_string()),
            url: Some("postgresql://a@db.internal:5432/prod".to_string()),
            host: "ignored".to_string(),
            ..Default::default()
        };
        assert_eq!(config.connection_string().unwrap(), "postgresql://a@db.internal:5432/prod");
    }

    #[test]
    fn test_missing_password_variable_is_an_error() {
        let config = UpstreamConfig {
            password_env: Some("SQLGUARD_TEST_PASSWORD_THAT_IS_NOT_SET".to_string()),
            ..fields_only()
        };
        assert!(matches!(config.connection_string(), Err(ConfigError::Config(_))));
    }

    #[test]
    fn test_yaml_defaults() {
        let config: UpstreamConfig = serde_yaml::from_str("host: warehouse.internal\n").unwrap();
        assert_eq!(config.url_env.as_deref(), Some("DATABASE_URL"));
        assert_eq!(config.port, 5432);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(10));
    }
}
