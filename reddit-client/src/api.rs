use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use chrono::DateTime;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use subgrab_core::{CoreError, Listing, Post, RedditApiError};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Posts requested per listing page; the API caps this at 100.
pub const PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, CoreError> {
        Self::with_base_url(user_agent, timeout, REDDIT_API_BASE)
    }

    pub fn with_base_url(
        user_agent: &str,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RateLimitConfig::reddit_oauth()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.queue_wait_time
        );

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(RedditApiError::RequestTimeout.into());
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(Self::status_error(&response, endpoint).into())
    }

    fn status_error(response: &Response, endpoint: &str) -> RedditApiError {
        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<f64>().ok())
                    .map(|secs| secs.ceil() as u64)
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
            StatusCode::FORBIDDEN => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            StatusCode::NOT_FOUND => RedditApiError::SubredditNotFound {
                subreddit: endpoint.to_string(),
            },
            s if s.is_server_error() => RedditApiError::ServerError {
                status_code: s.as_u16(),
            },
            s => RedditApiError::InvalidResponse {
                details: format!("Unexpected status {} for {}", s, endpoint),
            },
        }
    }

    /// Fetches one page of a subreddit listing, continuing after the `after` cursor.
    pub async fn get_subreddit_listing(
        &self,
        access_token: &str,
        subreddit: &str,
        listing: Listing,
        after: Option<&str>,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/{}", subreddit, listing.sort());
        let limit_str = limit.to_string();
        let mut params = vec![("limit", limit_str.as_str()), ("raw_json", "1")];

        if let Some(window) = listing.window() {
            params.push(("t", window.as_str()));
        }
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(params.as_slice()))
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }) => {
                    RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    }
                    .into()
                }
                other => other,
            })?;

        let listing_page: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse {} posts for r/{}", listing, subreddit),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{} ({})",
            listing_page.data.children.len(),
            subreddit,
            listing
        );
        Ok(listing_page)
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

impl From<RedditPostData> for Post {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            title: post_data.title,
            subreddit: post_data.subreddit,
            url: post_data.url,
            created_utc: DateTime::from_timestamp(post_data.created_utc as i64, 0),
        }
    }
}
