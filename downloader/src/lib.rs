//! Image download executor and the scrape loop that drives it.

pub mod fetch;
pub mod naming;
pub mod runner;
pub mod writer;

pub use fetch::{FetchOutcome, ImageFetcher, DEFAULT_DOWNLOAD_TIMEOUT};
pub use naming::{image_filename, sanitize_filename};
pub use runner::{ListingReport, RunSummary, ScrapeOptions, Scraper};
pub use writer::{ensure_output_dir, write_image, WriteOutcome};
