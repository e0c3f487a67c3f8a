//! Credential suppliers
//!
//! Every remote request asks the [`RegistryHandle`](crate::registry::RegistryHandle)'s
//! [`CredentialSupplier`] for the current token. [`CachedCredentials`] keeps the last
//! token and goes back to its [`TokenSource`] once the token is within the refresh skew
//! of its expiry; [`StaticCredentials`] never refreshes.

use crate::error::AuthError;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::HeaderValue;
use std::fmt;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Bearer,
}

impl AuthScheme {
    fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "Basic",
            AuthScheme::Bearer => "Bearer",
        }
    }
}

/// Opaque registry credential with an optional expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub scheme: AuthScheme,
    token: String,
    pub expires_at: Option<SystemTime>,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthToken {
    /// Token already in `Basic` form, e.g. the base64 `user:password` blob ECR returns
    pub fn basic(token: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::Basic,
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::Bearer,
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn from_credentials(username: &str, password: &str) -> Self {
        Self::basic(STANDARD.encode(format!("{}:{}", username, password)))
    }

    pub fn with_expiry(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expired once `now + skew` reaches the expiry; tokens without one never expire.
    /// A skew too large to represent counts as expired.
    pub fn is_expired(&self, skew: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => SystemTime::now()
                .checked_add(skew)
                .is_none_or(|deadline| deadline >= expires_at),
            None => false,
        }
    }

    /// `Authorization` header value, marked sensitive
    pub fn header_value(&self) -> Result<HeaderValue, AuthError> {
        let mut value = HeaderValue::from_str(&format!("{} {}", self.scheme.as_str(), self.token))
            .map_err(|_| AuthError::InvalidHeader)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Source of the authorization used for each remote operation
#[async_trait]
pub trait CredentialSupplier: Send + Sync + fmt::Debug {
    async fn authorization(&self) -> Result<Option<AuthToken>, AuthError>;
}

/// No credentials
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

#[async_trait]
impl CredentialSupplier for Anonymous {
    async fn authorization(&self) -> Result<Option<AuthToken>, AuthError> {
        Ok(None)
    }
}

/// Fixed token, set once and never rotated
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: AuthToken,
}

impl StaticCredentials {
    pub fn new(token: AuthToken) -> Self {
        Self { token }
    }

    pub fn basic_auth(username: &str, password: &str) -> Self {
        Self::new(AuthToken::from_credentials(username, password))
    }
}

#[async_trait]
impl CredentialSupplier for StaticCredentials {
    async fn authorization(&self) -> Result<Option<AuthToken>, AuthError> {
        Ok(Some(self.token.clone()))
    }
}

/// Produces fresh tokens for [`CachedCredentials`]
#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    async fn fetch_token(&self) -> Result<AuthToken, AuthError>;
}

/// Token cache that refreshes from its source once the token expires
#[derive(Debug)]
pub struct CachedCredentials<S> {
    source: S,
    skew: Duration,
    cached: RwLock<Option<AuthToken>>,
}

impl<S: TokenSource> CachedCredentials<S> {
    pub fn new(source: S, skew: Duration) -> Self {
        Self {
            source,
            skew,
            cached: RwLock::new(None),
        }
    }

    /// Seed the cache with an already fetched token.
    pub fn with_token(self, token: AuthToken) -> Self {
        Self {
            cached: RwLock::new(Some(token)),
            ..self
        }
    }

    /// Fetch a new token regardless of the cached one.
    pub async fn refresh(&self) -> Result<AuthToken, AuthError> {
        let mut guard = self.cached.write().await;
        let token = self.source.fetch_token().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn current(&self) -> Option<AuthToken> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|token| !token.is_expired(self.skew))
            .cloned()
    }
}

#[async_trait]
impl<S: TokenSource> CredentialSupplier for CachedCredentials<S> {
    async fn authorization(&self) -> Result<Option<AuthToken>, AuthError> {
        if let Some(token) = self.current().await {
            return Ok(Some(token));
        }

        let mut guard = self.cached.write().await;
        // another caller may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref().filter(|t| !t.is_expired(self.skew)) {
            return Ok(Some(token.clone()));
        }

        tracing::info!("Refreshing expired registry authorization token");
        let token = self.source.fetch_token().await?;
        *guard = Some(token.clone());
        Ok(Some(token))
    }
}
