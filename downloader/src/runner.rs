//! Drives listings end to end: stream posts, download images, record ids.

use crate::fetch::ImageFetcher;
use crate::naming::image_filename;
use crate::writer::{ensure_output_dir, file_exists, write_image, WriteOutcome};
use futures::{pin_mut, Stream, StreamExt};
use reddit_client::{image_posts, ListingSource};
use std::path::{Path, PathBuf};
use store::ProcessedSet;
use subgrab_core::{AppConfig, CoreError, ErrorReporter, Listing, Post};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ScrapeOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            state_dir: config.state_dir.clone(),
        }
    }
}

/// What happened to the posts of one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingReport {
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub already_processed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub listings_completed: usize,
    pub listings_failed: usize,
    pub total_downloaded: usize,
    pub cancelled: bool,
}

pub struct Scraper<'a, S> {
    source: &'a S,
    fetcher: &'a ImageFetcher,
    options: ScrapeOptions,
    error_reporter: ErrorReporter,
}

impl<'a, S: ListingSource> Scraper<'a, S> {
    pub fn new(source: &'a S, fetcher: &'a ImageFetcher, options: ScrapeOptions) -> Self {
        Self {
            source,
            fetcher,
            options,
            error_reporter: ErrorReporter::new(),
        }
    }

    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Scrapes one listing of `target` until it runs out of posts, fails, or is cancelled.
    ///
    /// The processed set is saved on every exit path. A listing error is
    /// returned after the save; cancellation is reported through the report.
    pub async fn run_listing(
        &self,
        target: &str,
        listing: Listing,
        cancel: &CancellationToken,
    ) -> Result<ListingReport, CoreError> {
        info!("Starting {} listing for r/{}", listing, target);

        let image_dir = ensure_output_dir(&self.options.output_dir, target).await?;
        tokio::fs::create_dir_all(&self.options.state_dir).await?;
        let mut processed =
            ProcessedSet::load(ProcessedSet::path_for(&self.options.state_dir, target)).await?;

        let posts = image_posts(self.source, target, listing, processed.snapshot());
        let mut report = ListingReport::default();
        let result = self
            .process_posts(posts, &mut processed, &image_dir, cancel, &mut report)
            .await;

        match (result, processed.save().await) {
            (Ok(()), Ok(())) => {}
            (Ok(()), Err(save_err)) => return Err(save_err),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(save_err)) => {
                self.error_reporter.report_warning(&save_err);
                return Err(e);
            }
        }

        info!("Total images downloaded: {}", report.downloaded);
        if report.cancelled {
            info!("Stopped {} listing for r/{} early", listing, target);
        } else {
            match listing.window() {
                Some(window) => info!(
                    "Completed downloading for {} listing for {}.",
                    listing.sort(),
                    window
                ),
                None => info!("Completed downloading for {} listing.", listing.sort()),
            }
        }
        Ok(report)
    }

    async fn process_posts<P>(
        &self,
        posts: P,
        processed: &mut ProcessedSet,
        image_dir: &Path,
        cancel: &CancellationToken,
        report: &mut ListingReport,
    ) -> Result<(), CoreError>
    where
        P: Stream<Item = Result<Post, CoreError>>,
    {
        pin_mut!(posts);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    return Ok(());
                }
                next = posts.next() => next,
            };

            let post = match next {
                Some(post) => post?,
                None => return Ok(()),
            };

            // The stream filters on a snapshot; ids recorded since then are caught here
            if processed.contains(&post.id) {
                report.already_processed += 1;
                continue;
            }

            let filename = image_filename(&post.url);
            let path = image_dir.join(&filename);

            match file_exists(&path).await {
                Ok(true) => {
                    debug!("{} already exists, skipping download", path.display());
                    report.skipped_existing += 1;
                }
                Ok(false) => {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            report.cancelled = true;
                            return Ok(());
                        }
                        outcome = self.fetcher.fetch(&post.url) => outcome,
                    };

                    match outcome.into_image() {
                        Some(bytes) => match write_image(&path, &bytes).await {
                            Ok(WriteOutcome::Written) => {
                                info!("Downloaded: {}", filename);
                                report.downloaded += 1;
                            }
                            Ok(WriteOutcome::AlreadyExists) => report.skipped_existing += 1,
                            Err(e) => {
                                warn!("Failed to save {} to {}: {}", post.url, path.display(), e);
                                report.failed += 1;
                            }
                        },
                        None => report.failed += 1,
                    }
                }
                Err(e) => {
                    warn!("Cannot use {} for {}: {}", path.display(), post.url, e);
                    report.failed += 1;
                }
            }

            // Per-post failures still count as handled; only store errors end the listing
            processed.record(&post.id).await?;
        }
    }

    /// Runs each listing in order against the same processed set.
    ///
    /// A failed listing is reported and skipped; cancellation stops the plan.
    pub async fn run_plan(
        &self,
        target: &str,
        listings: &[Listing],
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for &listing in listings {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            match self.run_listing(target, listing, cancel).await {
                Ok(report) => {
                    summary.total_downloaded += report.downloaded;
                    if report.cancelled {
                        summary.cancelled = true;
                        break;
                    }
                    summary.listings_completed += 1;
                }
                Err(e) => {
                    warn!("Listing {} for r/{} failed", listing, target);
                    self.error_reporter.report_error(&e);
                    summary.listings_failed += 1;
                }
            }
        }

        if !summary.cancelled && summary.listings_failed == 0 {
            info!("Images downloaded successfully from all listings and time filters!");
        }
        summary
    }
}
