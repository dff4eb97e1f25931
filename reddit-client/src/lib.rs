pub mod api;
pub mod listing;
pub mod rate_limiter;


pub use api::{RedditApiClient, RedditListing, RedditPostData, PAGE_LIMIT};
pub use listing::{image_posts, ListingPage, ListingSource};

use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, ResourceOwnerPassword, ResourceOwnerUsername,
    Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use subgrab_core::{
    ConfigError, CoreError, ErrorExt, Listing, RedditApiError, RedditCredentials,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub token_url: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for RedditOAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditOAuth2Config")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .field("token_url", &self.token_url)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedditOAuth2Config {
    pub fn new(
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
        user_agent: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            username,
            password,
            user_agent,
            token_url: REDDIT_TOKEN_URL.to_string(),
            api_base: api::REDDIT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_credentials(credentials: &RedditCredentials) -> Self {
        Self::new(
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            credentials.username.clone(),
            credentials.password.clone(),
            credentials.user_agent.clone(),
        )
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { expires_at: SystemTime },
    TokenExpired { expired_at: SystemTime },
}

/// Authenticated Reddit client for a script-type app.
///
/// Uses the OAuth2 password grant, so no browser round trip is needed. The
/// token is fetched lazily and renewed when it expires or is rejected.
#[derive(Debug)]
pub struct RedditClient {
    config: RedditOAuth2Config,
    oauth_client: BasicClient,
    api_client: RedditApiClient,
    token: Mutex<Option<RedditToken>>,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let invalid_url = |field: &str, value: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        };

        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string())
            .map_err(|_| invalid_url("auth_url", REDDIT_AUTH_URL))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|_| invalid_url("token_url", &config.token_url))?;
        url::Url::parse(&config.api_base).map_err(|_| invalid_url("api_base", &config.api_base))?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        let api_client =
            RedditApiClient::with_base_url(&config.user_agent, config.timeout, &config.api_base)?;

        Ok(Self {
            config,
            oauth_client,
            api_client,
            token: Mutex::new(None),
        })
    }

    pub fn get_required_scopes() -> Vec<&'static str> {
        vec!["read"]
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api_client
    }

    /// Requests a fresh access token and stores it.
    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        let token = self.request_token().await?;
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    pub async fn set_token(&self, token: RedditToken) {
        *self.token.lock().await = Some(token);
    }

    pub async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(self.get_auth_state().await, AuthState::Authenticated { .. })
    }

    pub async fn get_auth_state(&self) -> AuthState {
        match self.token.lock().await.as_ref() {
            None => AuthState::NotAuthenticated,
            Some(token) if token.is_expired() => AuthState::TokenExpired {
                expired_at: token.expires_at,
            },
            Some(token) => AuthState::Authenticated {
                expires_at: token.expires_at,
            },
        }
    }

    /// Returns a usable access token, authenticating first if needed.
    pub async fn ensure_authenticated(&self) -> Result<String, CoreError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.access_token.clone());
        }

        if guard.is_some() {
            debug!("Access token expired, re-authenticating");
        }
        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        let scopes = Self::get_required_scopes();
        let user_agent = self.config.user_agent.clone();

        info!("Authenticating with Reddit as {}", self.config.username);
        let response = self
            .oauth_client
            .exchange_password(
                &ResourceOwnerUsername::new(self.config.username.clone()),
                &ResourceOwnerPassword::new(self.config.password.clone()),
            )
            .add_scopes(scopes.iter().map(|s| Scope::new(s.to_string())))
            .request_async(|mut request: HttpRequest| async move {
                // Reddit rejects token requests without a descriptive user agent
                if let Ok(value) = oauth2::http::HeaderValue::from_str(&user_agent) {
                    request
                        .headers
                        .insert(oauth2::http::header::USER_AGENT, value);
                }
                async_http_client(request).await
            })
            .await
            .map_err(|e| {
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let expires_in = response.expires_in().unwrap_or(Duration::from_secs(3600));
        let scope = response
            .scopes()
            .map(|granted| granted.iter().map(|s| s.to_string()).collect())
            .unwrap_or_else(|| scopes.iter().map(|s| s.to_string()).collect());

        debug!("Obtained access token valid for {:?}", expires_in);
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_at: SystemTime::now() + expires_in,
            scope,
        })
    }
}

impl ListingSource for RedditClient {
    /// Fetches a page, renewing a rejected token or waiting out a rate limit once.
    async fn fetch_page(
        &self,
        subreddit: &str,
        listing: Listing,
        after: Option<&str>,
    ) -> Result<ListingPage, CoreError> {
        let mut retried = false;
        loop {
            let access_token = self.ensure_authenticated().await?;
            let result = self
                .api_client
                .get_subreddit_listing(&access_token, subreddit, listing, after, PAGE_LIMIT)
                .await;

            match result {
                Ok(page) => return Ok(page.into()),
                Err(CoreError::RedditApi(RedditApiError::InvalidToken)) if !retried => {
                    warn!("Access token rejected, re-authenticating");
                    self.invalidate_token().await;
                }
                Err(e @ CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }))
                    if !retried =>
                {
                    let wait = e.retry_after().unwrap_or(Duration::from_secs(60));
                    warn!("Rate limited by Reddit, waiting {:?} before retrying", wait);
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
            retried = true;
        }
    }
}
