use crate::error::{CanvasError, Result};
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

/// Create the default HTTP client for Canvas API requests
/// with connection pooling and the configured timeouts
pub fn create_rest_client(config: &Config) -> Result<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(50)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(CanvasError::transport)
}

/// Create the HTTP client for file uploads.
///
/// Redirects are not followed: Canvas answers the upload POST with a redirect
/// to a confirmation URL that must be called with credentials.
pub fn create_upload_client(config: &Config) -> Result<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(50)
        .timeout(Duration::from_secs(3600)) // 1 hour
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none())
        .build()
        .map_err(CanvasError::transport)
}

/// OAuth2 client registration used to refresh access tokens
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint; defaults to `<base_url>/login/oauth2/token`
    pub token_url: Option<String>,
}

impl OAuthClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        OAuthClientConfig {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: None,
        }
    }

    /// Override the token endpoint
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Configuration for the Canvas API client
#[derive(Debug, Clone)]
pub struct Config {
    /// Canvas instance URL, e.g. `https://canvas.example.edu`
    pub base_url: Option<String>,
    /// Path prefix of the REST API
    pub api_prefix: String,
    /// Page size appended to GET requests that don't set one
    pub per_page: Option<u32>,
    /// Total request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// OAuth2 client used for token refresh
    pub oauth: Option<OAuthClientConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: None,
            api_prefix: "/api/v1".to_string(),
            per_page: None,
            timeout: Duration::from_secs(300), // 5 minutes
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("canvas-lms-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            oauth: None,
        }
    }
}

impl Config {
    /// Create a new configuration for the given Canvas instance
    pub fn new(base_url: impl Into<String>) -> Self {
        Config {
            base_url: Some(base_url.into()),
            ..Config::default()
        }
    }

    /// Build a configuration from `CANVAS_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Some(base_url) = env_var("CANVAS_BASE_URL") {
            config.base_url = Some(base_url);
        }
        if let Some(prefix) = env_var("CANVAS_API_PREFIX") {
            config.api_prefix = prefix;
        }
        if let Some(per_page) = env_var("CANVAS_PER_PAGE") {
            match per_page.parse() {
                Ok(n) => config.per_page = Some(n),
                Err(_) => tracing::warn!(value = %per_page, "ignoring invalid CANVAS_PER_PAGE"),
            }
        }
        if let (Some(id), Some(secret)) = (
            env_var("CANVAS_OAUTH_CLIENT_ID"),
            env_var("CANVAS_OAUTH_CLIENT_SECRET"),
        ) {
            let mut oauth = OAuthClientConfig::new(id, secret);
            oauth.token_url = env_var("CANVAS_OAUTH_TOKEN_URL");
            config.oauth = Some(oauth);
        }

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_oauth_client(mut self, oauth: OAuthClientConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Validated instance URL
    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(CanvasError::MissingBaseUrl)?;
        Ok(Url::parse(raw.trim_end_matches('/'))?)
    }

    /// Full URL for an API path.
    ///
    /// Absolute URLs (pagination links, upload confirmations) are accepted only
    /// on the configured instance, since requests to them carry credentials.
    pub fn endpoint_url(&self, path: &str) -> Result<Url> {
        let base = self.base_url()?;
        if path.starts_with("http://") || path.starts_with("https://") {
            let url = Url::parse(path)?;
            if url.origin() != base.origin() {
                return Err(CanvasError::InvalidArgument(format!(
                    "link points outside the configured Canvas instance: {}",
                    url.origin().ascii_serialization()
                )));
            }
            return Ok(url);
        }

        let base = base.as_str().trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        let url = if prefix.is_empty() {
            format!("{}/{}", base, path)
        } else {
            format!("{}/{}/{}", base, prefix, path)
        };
        Ok(Url::parse(&url)?)
    }

    /// Whether `url` belongs to the configured instance
    pub fn is_instance_url(&self, url: &Url) -> Result<bool> {
        Ok(self.base_url()?.origin() == url.origin())
    }

    /// Token endpoint used for OAuth refresh
    pub fn token_url(&self) -> Result<Url> {
        match self.oauth.as_ref().and_then(|o| o.token_url.as_deref()) {
            Some(url) => Ok(Url::parse(url)?),
            None => Ok(self.base_url()?.join("/login/oauth2/token")?),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
