//! Managed registry (Amazon ECR) authentication
//!
//! Hosts matching `<12-digit account>.dkr.ecr.<region>.amazonaws.com` get their
//! credentials from the ECR control plane: an authorization token is exchanged for the
//! ambient AWS credentials and sent as `Basic <token>` on every registry request.

use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::registry::token_manager::{AuthToken, CachedCredentials, TokenSource};
use crate::registry::transport::RegistryHandle;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime};

const ECR_HOST_REGEX: &str = r"^\d{12}\.dkr\.ecr\.[a-z0-9-]+\.amazonaws\.com(\.cn)?$";

static ECR_HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ECR_HOST_REGEX).expect("managed registry host pattern is a valid regex")
});

/// Compile the fixed hostname patterns.
///
/// Called once at process startup so a broken pattern aborts before any request.
pub fn check_patterns() {
    LazyLock::force(&ECR_HOST_PATTERN);
}

/// Hostname part of a registry address: no scheme, path or port.
fn registry_hostname(registry: &str) -> &str {
    let without_scheme = registry
        .split_once("://")
        .map_or(registry, |(_, rest)| rest);
    let host = without_scheme.split('/').next().unwrap_or(without_scheme);
    host.rsplit_once(':')
        .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
        .map_or(host, |(host, _)| host)
}

/// Whether a registry belongs to the managed ECR family.
pub fn is_ecr_registry(registry: &str) -> bool {
    ECR_HOST_PATTERN.is_match(registry_hostname(registry))
}

/// One entry of an authorization-token response
#[derive(Clone, Default)]
pub struct AuthorizationData {
    pub token: Option<String>,
    pub expires_at: Option<SystemTime>,
    pub proxy_endpoint: Option<String>,
}

impl fmt::Debug for AuthorizationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationData")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("proxy_endpoint", &self.proxy_endpoint)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationResponse {
    pub entries: Vec<AuthorizationData>,
}

/// Request/response contract with the cloud provider's IAM layer
#[async_trait]
pub trait TokenExchange: Send + Sync + fmt::Debug {
    async fn get_authorization_token(&self) -> Result<AuthorizationResponse, AuthError>;
}

/// [`TokenExchange`] backed by the AWS SDK
#[derive(Debug, Clone)]
pub struct EcrTokenExchange {
    client: aws_sdk_ecr::Client,
}

impl EcrTokenExchange {
    /// Load AWS configuration from the environment, optionally pointing the ECR client at
    /// a non-default endpoint.
    pub async fn from_env(endpoint: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = endpoint {
            tracing::debug!(endpoint, "Using custom ECR endpoint");
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Self {
            client: aws_sdk_ecr::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl TokenExchange for EcrTokenExchange {
    async fn get_authorization_token(&self) -> Result<AuthorizationResponse, AuthError> {
        let output = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| AuthError::Exchange(aws_sdk_ecr::error::DisplayErrorContext(e).to_string()))?;

        let entries = output
            .authorization_data()
            .iter()
            .map(|data| AuthorizationData {
                token: data.authorization_token().map(str::to_string),
                expires_at: data
                    .expires_at()
                    .and_then(|t| SystemTime::try_from(*t).ok()),
                proxy_endpoint: data.proxy_endpoint().map(str::to_string),
            })
            .collect();

        Ok(AuthorizationResponse { entries })
    }
}

/// Check an authorization response and turn its entry into a token.
pub fn token_from_response(response: AuthorizationResponse) -> Result<AuthToken, AuthError> {
    let extra = response.entries.len().saturating_sub(1);
    let data = response
        .entries
        .into_iter()
        .next()
        .ok_or(AuthError::EmptyAuthorizationData)?;
    if extra > 0 {
        tracing::warn!(extra, "ECR returned more than one authorization entry, using the first");
    }

    let token = data
        .token
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::EmptyToken)?;

    let token = AuthToken::basic(token);
    Ok(match data.expires_at {
        Some(expires_at) => token.with_expiry(expires_at),
        None => token,
    })
}

/// [`TokenSource`] that asks a [`TokenExchange`] for each new token
#[derive(Debug)]
pub struct ExchangeTokenSource<X> {
    exchange: X,
}

#[async_trait]
impl<X: TokenExchange> TokenSource for ExchangeTokenSource<X> {
    async fn fetch_token(&self) -> Result<AuthToken, AuthError> {
        token_from_response(self.exchange.get_authorization_token().await?)
    }
}

/// Authorizes registry handles for managed-registry hosts
#[derive(Debug)]
pub struct AuthProvider<X> {
    exchange: X,
    refresh_skew: Duration,
}

impl AuthProvider<EcrTokenExchange> {
    pub async fn from_config(config: &ClientConfig) -> Self {
        let exchange = EcrTokenExchange::from_env(config.ecr_endpoint.as_deref()).await;
        Self::new(exchange, config.refresh_skew())
    }
}

impl<X: TokenExchange + 'static> AuthProvider<X> {
    pub fn new(exchange: X, refresh_skew: Duration) -> Self {
        Self {
            exchange,
            refresh_skew,
        }
    }

    pub fn detect(registry: &str) -> bool {
        is_ecr_registry(registry)
    }

    /// Exchange credentials for a registry token and install it on `handle`.
    ///
    /// The first token is fetched here so authentication failures surface at client
    /// construction; later requests reuse it until it nears expiry.
    pub async fn authorize(self, handle: &mut RegistryHandle) -> Result<(), AuthError> {
        tracing::info!(registry = handle.host(), "Authorizing with ECR");
        let source = ExchangeTokenSource {
            exchange: self.exchange,
        };
        let token = source.fetch_token().await?;
        token.header_value()?;

        let credentials = CachedCredentials::new(source, self.refresh_skew).with_token(token);
        handle.set_credentials(Arc::new(credentials));
        Ok(())
    }
}
