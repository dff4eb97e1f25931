use downloader::{ImageFetcher, ScrapeOptions, Scraper};
use reddit_client::{RedditClient, RedditOAuth2Config};
use subgrab_core::{AppConfig, CoreError, RedditCredentials};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "subgrab=info,reddit_client=info,downloader=info,store=info";

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = AppConfig::load()?;
    let credentials = RedditCredentials::from_env()?;
    tracing::info!("Starting subgrab for r/{}", config.subreddit);

    let client = RedditClient::new(
        RedditOAuth2Config::from_credentials(&credentials).with_timeout(config.api_timeout),
    )?;
    client.authenticate().await?;

    let fetcher = ImageFetcher::new(config.download_timeout)?;
    let scraper = Scraper::new(&client, &fetcher, ScrapeOptions::from_config(&config));

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let summary = scraper
        .run_plan(&config.subreddit, &config.listings, &cancel)
        .await;

    tracing::info!(
        "Finished: {} images downloaded across {} listings ({} failed{})",
        summary.total_downloaded,
        summary.listings_completed,
        summary.listings_failed,
        if summary.cancelled { ", interrupted" } else { "" }
    );
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    wait_for_signal().await;
    tracing::info!("Gracefully shutting down...");
    cancel.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Could not listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
