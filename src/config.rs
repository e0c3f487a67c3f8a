//! Client configuration
//!
//! Settings come from defaults overridden by environment variables; the CLI layers its
//! flags on top.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "SOCI Index Builder (soci-registry)";
pub const DEFAULT_TOKEN_REFRESH_SKEW_SECS: u64 = 300;

/// Custom, non-default endpoint for the ECR control plane
pub const ECR_ENDPOINT_ENV: &str = "ECR_ENDPOINT";

/// Username/password for registries outside the managed family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(RegistryError::Config("Username cannot be empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(RegistryError::Config("Password cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Only consulted for managed-registry hosts
    pub ecr_endpoint: Option<String>,
    pub user_agent: String,
    /// Talk plain HTTP to the registry
    pub insecure: bool,
    pub skip_tls: bool,
    /// Seconds before expiry at which a cached token counts as expired
    pub token_refresh_skew: u64,
    pub credentials: Option<AuthConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ecr_endpoint: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            insecure: false,
            skip_tls: false,
            token_refresh_skew: DEFAULT_TOKEN_REFRESH_SKEW_SECS,
            credentials: None,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var(ECR_ENDPOINT_ENV) {
            if !val.is_empty() {
                config.ecr_endpoint = Some(val);
            }
        }
        if let Ok(val) = env::var("SOCI_REGISTRY_INSECURE") {
            config.insecure = is_truthy(&val);
        }
        if let Ok(val) = env::var("SOCI_REGISTRY_SKIP_TLS") {
            config.skip_tls = is_truthy(&val);
        }
        if let Ok(val) = env::var("SOCI_REGISTRY_TOKEN_SKEW_SECS") {
            if let Ok(skew) = val.parse() {
                config.token_refresh_skew = skew;
            }
        }
        if let (Ok(username), Ok(password)) =
            (env::var("REGISTRY_USERNAME"), env::var("REGISTRY_PASSWORD"))
        {
            config.credentials = Some(AuthConfig::new(username, password));
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(RegistryError::Config("User agent cannot be empty".to_string()));
        }
        if let Some(credentials) = &self.credentials {
            credentials.validate()?;
        }
        Ok(())
    }

    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.token_refresh_skew)
    }

    pub fn scheme(&self) -> &'static str {
        if self.insecure { "http" } else { "https" }
    }
}

fn is_truthy(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheme(), "https");
        assert_eq!(config.refresh_skew(), Duration::from_secs(300));
    }

    #[test]
    fn rejects_empty_user_agent_and_credentials() {
        let config = ClientConfig {
            user_agent: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            credentials: Some(AuthConfig::new("user".to_string(), String::new())),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
