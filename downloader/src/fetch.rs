use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client, StatusCode};
use std::time::Duration;
use subgrab_core::CoreError;
use tracing::{debug, warn};

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Statuses that mean the image was removed or replaced by a placeholder.
const MOVED_STATUSES: [StatusCode; 4] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
];

#[derive(Debug)]
pub enum FetchOutcome {
    Image(Vec<u8>),
    Moved {
        status: u16,
    },
    Rejected {
        status: u16,
        content_type: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl FetchOutcome {
    pub fn into_image(self) -> Option<Vec<u8>> {
        match self {
            FetchOutcome::Image(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, FetchOutcome::Image(_))
    }
}

/// Single-attempt image downloader. Redirects are never followed.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    http_client: Client,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self { http_client })
    }

    /// GETs `url` once and classifies the response. Never returns an error:
    /// every failure is folded into the outcome and logged.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to download {}: {}", url, e);
                return FetchOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        if MOVED_STATUSES.contains(&status) {
            warn!("Image has been removed or is unavailable: {}", url);
            return FetchOutcome::Moved {
                status: status.as_u16(),
            };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let is_image = content_type
            .as_deref()
            .is_some_and(|value| value.contains("image/"));

        if status != StatusCode::OK || !is_image {
            warn!(
                "Failed to download or not an image {}, status code: {}",
                url,
                status.as_u16()
            );
            return FetchOutcome::Rejected {
                status: status.as_u16(),
                content_type,
            };
        }

        let mut bytes = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => bytes.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to download {}: {}", url, e);
                    return FetchOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        }

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        FetchOutcome::Image(bytes)
    }
}
