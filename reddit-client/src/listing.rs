//! Lazy, paginated listing of image posts.

use crate::api::{RedditListing, RedditPostData};
use futures::stream::{self, Stream, TryStreamExt};
use std::collections::HashSet;
use subgrab_core::{CoreError, Listing, Post};
use tracing::debug;

/// One page of a listing together with the cursor for the next one.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub posts: Vec<Post>,
    pub after: Option<String>,
}

impl From<RedditListing<RedditPostData>> for ListingPage {
    fn from(listing: RedditListing<RedditPostData>) -> Self {
        Self {
            posts: listing
                .data
                .children
                .into_iter()
                .map(|child| child.data.into())
                .collect(),
            after: listing.data.after,
        }
    }
}

/// Anything that can serve listing pages: the live API client, or a fake in tests.
// Pages are always awaited on the scraping task itself, so the futures need no Send bound
#[allow(async_fn_in_trait)]
pub trait ListingSource {
    async fn fetch_page(
        &self,
        subreddit: &str,
        listing: Listing,
        after: Option<&str>,
    ) -> Result<ListingPage, CoreError>;
}

enum Cursor {
    Start,
    After(String),
    Done,
}

/// Streams the image posts of a listing that are not in `processed`.
///
/// Pages are only requested as the stream is polled, and pagination continues
/// until the API stops returning an `after` cursor or hands back an empty page.
/// A page error is yielded once and ends the stream.
pub fn image_posts<'a, S>(
    source: &'a S,
    subreddit: &'a str,
    listing: Listing,
    processed: HashSet<String>,
) -> impl Stream<Item = Result<Post, CoreError>> + 'a
where
    S: ListingSource,
{
    let pages = stream::unfold(Cursor::Start, move |cursor| async move {
        let after = match cursor {
            Cursor::Start => None,
            Cursor::After(after) => Some(after),
            Cursor::Done => return None,
        };

        match source.fetch_page(subreddit, listing, after.as_deref()).await {
            Ok(page) => {
                let next = match page.after {
                    Some(after) if !page.posts.is_empty() => Cursor::After(after),
                    _ => Cursor::Done,
                };
                Some((Ok(page.posts), next))
            }
            Err(e) => Some((Err(e), Cursor::Done)),
        }
    });

    pages
        .map_ok(|posts| stream::iter(posts.into_iter().map(Ok::<Post, CoreError>)))
        .try_flatten()
        .try_filter(move |post| {
            let keep = !processed.contains(&post.id) && post.has_image_url();
            if !keep {
                debug!("Skipping post {} ({})", post.id, post.url);
            }
            futures::future::ready(keep)
        })
}
