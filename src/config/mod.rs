//! Configuration types for the Zscaler client core.
//!
//! Every credential field falls back to the service's environment variables
//! at [`ZscalerConfigBuilder::build`]; values set on the builder win.

use crate::auth::Credential;
use crate::errors::{ZscalerError, ZscalerResult};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Vendor component of the User-Agent header.
pub const USER_AGENT_VENDOR: &str = "zscaler-sdk-rust";

/// Private-access configuration host.
pub const ZPA_DEFAULT_HOST: &str = "https://config.private.zscaler.com";

/// Client-connector API base.
pub const ZCC_DEFAULT_BASE_URL: &str = "https://api-mobile.zscaler.net/papi";

/// The service families sharing this client core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Internet access (ZIA).
    InternetAccess,
    /// Private access (ZPA).
    PrivateAccess,
    /// Digital experience (ZDX).
    DigitalExperience,
    /// Client connector (ZCC).
    ClientConnector,
    /// Cloud/branch connector (ZCON).
    BranchConnector,
    /// Cloud sandbox submission.
    Sandbox,
}

/// Session endpoints, relative to the service base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEndpoints {
    /// Login endpoint.
    pub login: Option<&'static str>,
    /// Status or validate endpoint.
    pub status: Option<&'static str>,
    /// Sign-out endpoint.
    pub logout: Option<&'static str>,
}

impl Service {
    /// Product code used in logs and the User-Agent.
    pub fn product(&self) -> &'static str {
        match self {
            Self::InternetAccess => "zia",
            Self::PrivateAccess => "zpa",
            Self::DigitalExperience => "zdx",
            Self::ClientConnector => "zcc",
            Self::BranchConnector => "zcon",
            Self::Sandbox => "sandbox",
        }
    }

    /// Login, status and sign-out endpoints.
    pub fn session_endpoints(&self) -> SessionEndpoints {
        match self {
            Self::InternetAccess => SessionEndpoints {
                login: Some("/authenticatedSession"),
                status: Some("/authenticatedSession"),
                logout: Some("/authenticatedSession"),
            },
            Self::BranchConnector => SessionEndpoints {
                login: Some("/auth"),
                status: Some("/auth"),
                logout: Some("/auth"),
            },
            Self::PrivateAccess => SessionEndpoints {
                login: Some("/signin"),
                status: None,
                logout: None,
            },
            Self::DigitalExperience => SessionEndpoints {
                login: Some("/oauth/token"),
                status: Some("/oauth/validate"),
                logout: None,
            },
            Self::ClientConnector => SessionEndpoints {
                login: Some("/auth/v1/login"),
                status: None,
                logout: None,
            },
            Self::Sandbox => SessionEndpoints {
                login: None,
                status: None,
                logout: None,
            },
        }
    }

    /// Whether `credential` is the variant this service authenticates with.
    pub fn accepts(&self, credential: &Credential) -> bool {
        matches!(
            (self, credential),
            (Self::InternetAccess | Self::BranchConnector, Credential::LegacyApiKey(_))
                | (Self::PrivateAccess, Credential::OAuthClient(_))
                | (Self::DigitalExperience, Credential::HashedKey(_))
                | (Self::ClientConnector, Credential::SessionToken(_))
                | (Self::Sandbox, Credential::SandboxToken(_))
        )
    }

    /// Default User-Agent for this service.
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} ({})",
            USER_AGENT_VENDOR,
            env!("CARGO_PKG_VERSION"),
            self.product()
        )
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.product())
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
    /// Ceiling for computed delays.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections per host.
    pub max_idle_per_host: usize,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Resolved client configuration for one service tenant.
#[derive(Debug, Clone)]
pub struct ZscalerConfig {
    /// Service family.
    pub service: Service,
    /// Login credential.
    pub credential: Credential,
    /// Service base URL; session endpoints resolve against it.
    pub base_url: String,
    /// Private-access customer id.
    pub customer_id: Option<String>,
    /// Cloud name the base URL was derived from.
    pub cloud: Option<String>,
    /// Read timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Connection pool configuration.
    pub pool: PoolConfig,
    /// Extra `(snake, camel)` key overrides for this client.
    pub key_overrides: Vec<(String, String)>,
    /// Cancellation token shared by every operation on the client.
    pub cancellation: CancellationToken,
}

impl ZscalerConfig {
    /// Creates a new configuration builder.
    pub fn builder(service: Service) -> ZscalerConfigBuilder {
        ZscalerConfigBuilder::new(service)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ZscalerResult<()> {
        if self.base_url.is_empty() {
            return Err(ZscalerError::configuration("Base URL cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ZscalerError::configuration(format!(
                "Base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }

        if !self.service.accepts(&self.credential) {
            return Err(ZscalerError::configuration(format!(
                "Credential variant '{}' is not accepted by {}",
                self.credential.variant_name(),
                self.service
            )));
        }

        if self.service == Service::PrivateAccess && self.customer_id.is_none() {
            return Err(ZscalerError::configuration(
                "Missing required credential 'customer_id' (set ZPA_CUSTOMER_ID)",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ZscalerError::configuration("Retry max_attempts must be at least 1"));
        }

        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ZscalerError::configuration("Timeouts must be non-zero"));
        }

        Ok(())
    }
}

/// Builder for [`ZscalerConfig`].
#[derive(Debug)]
pub struct ZscalerConfigBuilder {
    service: Service,
    credential: Option<Credential>,
    api_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    customer_id: Option<String>,
    sandbox_token: Option<String>,
    cloud: Option<String>,
    override_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    retry: Option<RetryConfig>,
    pool: Option<PoolConfig>,
    key_overrides: Vec<(String, String)>,
    cancellation: Option<CancellationToken>,
}

impl ZscalerConfigBuilder {
    /// Creates a new builder for `service`.
    pub fn new(service: Service) -> Self {
        Self {
            service,
            credential: None,
            api_key: None,
            username: None,
            password: None,
            client_id: None,
            client_secret: None,
            customer_id: None,
            sandbox_token: None,
            cloud: None,
            override_url: None,
            timeout: None,
            connect_timeout: None,
            user_agent: None,
            retry: None,
            pool: None,
            key_overrides: Vec::new(),
            cancellation: None,
        }
    }

    /// Sets a fully formed credential, bypassing credential env vars.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the legacy API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the admin username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the admin password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the client id (key id for digital experience).
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret (key secret for digital experience).
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the private-access customer id.
    pub fn customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Sets the sandbox token.
    pub fn sandbox_token(mut self, token: impl Into<String>) -> Self {
        self.sandbox_token = Some(token.into());
        self
    }

    /// Sets the cloud name embedded in the base URL.
    pub fn cloud(mut self, cloud: impl Into<String>) -> Self {
        self.cloud = Some(cloud.into());
        self
    }

    /// Replaces the computed base URL (the host, for private access).
    pub fn override_url(mut self, url: impl Into<String>) -> Self {
        self.override_url = Some(url.into());
        self
    }

    /// Sets the read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Disables retries.
    pub fn no_retry(mut self) -> Self {
        self.retry = Some(RetryConfig::disabled());
        self
    }

    /// Sets the connection pool configuration.
    pub fn pool(mut self, config: PoolConfig) -> Self {
        self.pool = Some(config);
        self
    }

    /// Adds an irregular key override for this client.
    pub fn key_override(mut self, snake: impl Into<String>, camel: impl Into<String>) -> Self {
        self.key_overrides.push((snake.into(), camel.into()));
        self
    }

    /// Uses a caller-owned cancellation token.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Builds the configuration, reading unset fields from the process environment.
    pub fn build(self) -> ZscalerResult<ZscalerConfig> {
        self.build_with_env(|name| std::env::var(name).ok())
    }

    /// Builds the configuration, reading unset fields through `lookup`.
    pub fn build_with_env<F>(self, lookup: F) -> ZscalerResult<ZscalerConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let pick = |explicit: Option<String>, var: &str| explicit.or_else(|| env(var));
        let service = self.service;

        let (credential, cloud, override_url, customer_id) = match service {
            Service::InternetAccess | Service::BranchConnector => {
                let prefix = if service == Service::InternetAccess { "ZIA" } else { "ZCON" };
                let (key_var, user_var, pass_var) = (
                    format!("{}_API_KEY", prefix),
                    format!("{}_USERNAME", prefix),
                    format!("{}_PASSWORD", prefix),
                );
                let credential = match self.credential {
                    Some(c) => c,
                    None => Credential::legacy(
                        require(pick(self.api_key, &key_var), "api_key", &key_var)?,
                        require(pick(self.username, &user_var), "username", &user_var)?,
                        require(pick(self.password, &pass_var), "password", &pass_var)?,
                    ),
                };
                let override_url = if service == Service::BranchConnector {
                    pick(self.override_url, "ZCON_OVERRIDE_URL")
                } else {
                    self.override_url
                };
                (credential, pick(self.cloud, &format!("{}_CLOUD", prefix)), override_url, None)
            }
            Service::PrivateAccess => {
                let credential = match self.credential {
                    Some(c) => c,
                    None => Credential::oauth(
                        require(
                            pick(self.client_id, "ZPA_CLIENT_ID"),
                            "client_id",
                            "ZPA_CLIENT_ID",
                        )?,
                        require(
                            pick(self.client_secret, "ZPA_CLIENT_SECRET"),
                            "client_secret",
                            "ZPA_CLIENT_SECRET",
                        )?,
                    ),
                };
                let customer_id = Some(require(
                    pick(self.customer_id, "ZPA_CUSTOMER_ID"),
                    "customer_id",
                    "ZPA_CUSTOMER_ID",
                )?);
                (credential, None, self.override_url, customer_id)
            }
            Service::DigitalExperience => {
                let credential = match self.credential {
                    Some(c) => c,
                    None => Credential::hashed_key(
                        require(
                            pick(self.client_id, "ZDX_CLIENT_ID"),
                            "client_id",
                            "ZDX_CLIENT_ID",
                        )?,
                        require(
                            pick(self.client_secret, "ZDX_CLIENT_SECRET"),
                            "client_secret",
                            "ZDX_CLIENT_SECRET",
                        )?,
                    ),
                };
                (
                    credential,
                    pick(self.cloud, "ZDX_CLOUD"),
                    pick(self.override_url, "ZDX_OVERRIDE_URL"),
                    None,
                )
            }
            Service::ClientConnector => {
                let credential = match self.credential {
                    Some(c) => c,
                    None => Credential::session_token(
                        require(
                            pick(self.client_id, "ZCC_CLIENT_ID"),
                            "client_id",
                            "ZCC_CLIENT_ID",
                        )?,
                        require(
                            pick(self.client_secret, "ZCC_CLIENT_SECRET"),
                            "client_secret",
                            "ZCC_CLIENT_SECRET",
                        )?,
                    ),
                };
                (credential, None, self.override_url, None)
            }
            Service::Sandbox => {
                let credential = match self.credential {
                    Some(c) => c,
                    None => Credential::sandbox(require(
                        pick(self.sandbox_token, "SANDBOX_TOKEN"),
                        "sandbox_token",
                        "SANDBOX_TOKEN",
                    )?),
                };
                (
                    credential,
                    pick(self.cloud, "ZIA_CLOUD"),
                    pick(self.override_url, "ZIA_OVERRIDE_SANDBOX_URL"),
                    None,
                )
            }
        };

        let base_url = match override_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => default_base_url(service, cloud.as_deref())?,
        };

        let config = ZscalerConfig {
            service,
            credential,
            base_url,
            customer_id,
            cloud,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| service.user_agent()),
            retry: self.retry.unwrap_or_default(),
            pool: self.pool.unwrap_or_default(),
            key_overrides: self.key_overrides,
            cancellation: self.cancellation.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

fn require(value: Option<String>, field: &str, var: &str) -> ZscalerResult<String> {
    value.ok_or_else(|| {
        ZscalerError::configuration(format!(
            "Missing required credential '{}' (set {})",
            field, var
        ))
    })
}

fn default_base_url(service: Service, cloud: Option<&str>) -> ZscalerResult<String> {
    let cloud = || {
        cloud.ok_or_else(|| {
            ZscalerError::configuration(format!("Missing required 'cloud' for {}", service))
        })
    };

    Ok(match service {
        Service::InternetAccess => format!("https://zsapi.{}.net/api/v1", cloud()?),
        Service::PrivateAccess => ZPA_DEFAULT_HOST.to_string(),
        Service::DigitalExperience => format!("https://api.{}.net/v1", cloud()?),
        Service::ClientConnector => ZCC_DEFAULT_BASE_URL.to_string(),
        Service::BranchConnector => format!("https://connector.{}.net/api/v1", cloud()?),
        Service::Sandbox => format!("https://csbapi.{}.net/zscsb/submit", cloud()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ZscalerErrorKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use test_case::test_case;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_zia_from_env() {
        let config = ZscalerConfig::builder(Service::InternetAccess)
            .build_with_env(env(&[
                ("ZIA_API_KEY", "abcdef123456"),
                ("ZIA_USERNAME", "admin@example.com"),
                ("ZIA_PASSWORD", "pw"),
                ("ZIA_CLOUD", "zscalerthree"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "https://zsapi.zscalerthree.net/api/v1");
        assert_eq!(config.cloud.as_deref(), Some("zscalerthree"));
        assert!(matches!(
            config.credential,
            Credential::LegacyApiKey(ref c) if c.username == "admin@example.com"
        ));
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_builder_overrides_env() {
        let config = ZscalerConfig::builder(Service::InternetAccess)
            .username("explicit@example.com")
            .cloud("zscalerbeta")
            .build_with_env(env(&[
                ("ZIA_API_KEY", "abcdef123456"),
                ("ZIA_USERNAME", "env@example.com"),
                ("ZIA_PASSWORD", "pw"),
                ("ZIA_CLOUD", "zscaler"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "https://zsapi.zscalerbeta.net/api/v1");
        assert!(matches!(
            config.credential,
            Credential::LegacyApiKey(ref c) if c.username == "explicit@example.com"
        ));
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = ZscalerConfig::builder(Service::ClientConnector)
            .client_id("id")
            .build_with_env(env(&[]))
            .unwrap_err();

        assert_eq!(err.kind(), ZscalerErrorKind::Configuration);
        assert!(err.message().contains("ZCC_CLIENT_SECRET"));
    }

    #[test]
    fn test_zpa_requires_customer_id() {
        let err = ZscalerConfig::builder(Service::PrivateAccess)
            .client_id("id")
            .client_secret("secret")
            .build_with_env(env(&[]))
            .unwrap_err();

        assert!(err.message().contains("ZPA_CUSTOMER_ID"));
    }

    #[test_case(
        Service::DigitalExperience,
        &[("ZDX_CLIENT_ID", "k"), ("ZDX_CLIENT_SECRET", "s"), ("ZDX_CLOUD", "zdxcloud")],
        "https://api.zdxcloud.net/v1"
    )]
    #[test_case(
        Service::DigitalExperience,
        &[
            ("ZDX_CLIENT_ID", "k"),
            ("ZDX_CLIENT_SECRET", "s"),
            ("ZDX_OVERRIDE_URL", "https://zdx.example.com/v1/"),
        ],
        "https://zdx.example.com/v1"
    )]
    #[test_case(
        Service::ClientConnector,
        &[("ZCC_CLIENT_ID", "k"), ("ZCC_CLIENT_SECRET", "s")],
        "https://api-mobile.zscaler.net/papi"
    )]
    #[test_case(
        Service::BranchConnector,
        &[
            ("ZCON_API_KEY", "abcdef123456"),
            ("ZCON_USERNAME", "u"),
            ("ZCON_PASSWORD", "p"),
            ("ZCON_CLOUD", "zscaler"),
        ],
        "https://connector.zscaler.net/api/v1"
    )]
    #[test_case(
        Service::BranchConnector,
        &[
            ("ZCON_API_KEY", "abcdef123456"),
            ("ZCON_USERNAME", "u"),
            ("ZCON_PASSWORD", "p"),
            ("ZCON_OVERRIDE_URL", "https://connector.example.com/api/v1"),
        ],
        "https://connector.example.com/api/v1"
    )]
    #[test_case(
        Service::Sandbox,
        &[("SANDBOX_TOKEN", "t"), ("ZIA_CLOUD", "zscalertwo")],
        "https://csbapi.zscalertwo.net/zscsb/submit"
    )]
    #[test_case(
        Service::Sandbox,
        &[
            ("SANDBOX_TOKEN", "t"),
            ("ZIA_OVERRIDE_SANDBOX_URL", "https://sandbox.example.com/submit"),
        ],
        "https://sandbox.example.com/submit"
    )]
    #[test_case(
        Service::PrivateAccess,
        &[
            ("ZPA_CLIENT_ID", "k"),
            ("ZPA_CLIENT_SECRET", "s"),
            ("ZPA_CUSTOMER_ID", "216196257331281920"),
        ],
        "https://config.private.zscaler.com"
    )]
    fn test_base_urls(service: Service, vars: &[(&str, &str)], expected: &str) {
        let config = ZscalerConfig::builder(service).build_with_env(env(vars)).unwrap();
        assert_eq!(config.base_url, expected);
    }

    #[test]
    fn test_missing_cloud() {
        let err = ZscalerConfig::builder(Service::DigitalExperience)
            .client_id("k")
            .client_secret("s")
            .build_with_env(env(&[]))
            .unwrap_err();
        assert!(err.message().contains("cloud"));
    }

    #[test]
    fn test_mismatched_credential_rejected() {
        let err = ZscalerConfig::builder(Service::ClientConnector)
            .credential(Credential::sandbox("t"))
            .build_with_env(env(&[]))
            .unwrap_err();
        assert_eq!(err.kind(), ZscalerErrorKind::Configuration);
    }

    #[test]
    fn test_invalid_override_url() {
        let result = ZscalerConfig::builder(Service::ClientConnector)
            .client_id("k")
            .client_secret("s")
            .override_url("invalid-url")
            .build_with_env(env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_user_agent_names_product() {
        let ua = Service::DigitalExperience.user_agent();
        assert!(ua.starts_with("zscaler-sdk-rust/"));
        assert!(ua.ends_with("(zdx)"));
    }
}
