//! Client configuration.
//!
//! [`PlatformConfig`] mirrors the platform block the home-automation host hands
//! over (camelCase JSON, every field optional). [`ClientConfig`] is the
//! validated form the client is built from.

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;

/// Backend used when the platform config does not name one.
pub const DEFAULT_HOSTNAME: &str = "https://fcutappli.frisquet.com/api/v1";

/// Application identifier sent with the login exchange.
pub const DEFAULT_APP_ID: &str = "1.9.1";

/// User agent of the vendor's iOS application.
pub const DEFAULT_USER_AGENT: &str = "Frisquet Connect/2.3 (iPhone; iOS 13.3; Scale/2.00)";

/// Environment variable holding an encoded password that overrides the
/// configured one.
pub const PASSWORD_ENV_VAR: &str = "HOMEBRIDGE_FRISQUET_CONNECT_PASSWORD";

/// Platform configuration as supplied by the host.
///
/// # Examples
///
/// ```
/// use frisquet_connect::PlatformConfig;
///
/// let platform: PlatformConfig = serde_json::from_str(
///     r#"{"platform": "FrisquetConnect", "username": "me@example.com", "password": "secret"}"#,
/// ).unwrap();
/// assert_eq!(platform.username.as_deref(), Some("me@example.com"));
/// assert!(platform.hostname.is_none());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub app_id: Option<String>,
    pub user_agent: Option<String>,
    /// Caps the re-authentication backoff exponent.
    pub reauth_max_exponent: Option<u32>,
}

/// Validated connection settings for a [`Client`](crate::Client).
///
/// # Examples
///
/// ```
/// use frisquet_connect::{ClientConfig, DEFAULT_APP_ID};
///
/// let config = ClientConfig::new("https://example.test", "u", "p").unwrap();
/// assert_eq!(config.app_id(), DEFAULT_APP_ID);
///
/// assert!(ClientConfig::new("https://example.test", "", "p").is_err());
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    hostname: String,
    username: String,
    password: String,
    app_id: String,
    user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration with the default app id and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if any field is empty.
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            hostname: required("hostname", Some(hostname.into()))?,
            username: required("username", Some(username.into()))?,
            password: required("password", Some(password.into()))?,
            app_id: DEFAULT_APP_ID.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Validates a platform configuration.
    ///
    /// `password_override` replaces the configured password when present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] naming the first missing field.
    pub fn from_platform(
        platform: &PlatformConfig,
        password_override: Option<String>,
    ) -> Result<Self> {
        let hostname = platform
            .hostname
            .clone()
            .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
        let hostname = required("hostname", Some(hostname))?;
        let username = required("username", platform.username.clone())?;
        let password = required("password", password_override.or_else(|| platform.password.clone()))?;

        tracing::debug!(
            username = %username,
            hostname = %hostname,
            "Creating Frisquet Connect client configuration"
        );

        Ok(Self {
            hostname,
            username,
            password,
            app_id: non_empty(platform.app_id.clone())
                .unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            user_agent: non_empty(platform.user_agent.clone())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    /// Validates a platform configuration, taking the password from
    /// [`PASSWORD_ENV_VAR`] when it is set.
    ///
    /// The variable holds an encoded credential; `decode` turns it into the
    /// plain password.
    pub fn from_platform_env<F>(platform: &PlatformConfig, decode: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let password_override = match std::env::var(PASSWORD_ENV_VAR) {
            Ok(encoded) if !encoded.is_empty() => Some(decode(&encoded)?),
            _ => None,
        };
        Self::from_platform(platform, password_override)
    }

    /// Overrides the application id sent on login.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Overrides the user agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("app_id", &self.app_id)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    non_empty(value).ok_or_else(|| {
        Error::ConfigurationError(format!(
            "Missing \"{}\" config field for platform",
            field
        ))
    })
}
