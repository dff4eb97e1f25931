use crate::error::CoreError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// URL suffixes treated as direct image links. Matched case-sensitively against the raw URL.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub subreddit: String,
    pub url: String,
    pub created_utc: Option<DateTime<Utc>>,
}

impl Post {
    pub fn has_image_url(&self) -> bool {
        IMAGE_EXTENSIONS.iter().any(|ext| self.url.ends_with(ext))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortMode {
    Hot,
    New,
    Top,
    Rising,
    Controversial,
}

impl SortMode {
    pub const ALL: [SortMode; 5] = [
        SortMode::Hot,
        SortMode::New,
        SortMode::Top,
        SortMode::Rising,
        SortMode::Controversial,
    ];

    /// Path segment used by the listing endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
            SortMode::Controversial => "controversial",
        }
    }

    /// Only top and controversial listings are scoped by a time window.
    pub fn uses_time_window(&self) -> bool {
        matches!(self, SortMode::Top | SortMode::Controversial)
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| CoreError::InvalidInput {
                message: format!("unknown sort mode '{}'", s),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 5] = [
        TimeWindow::Day,
        TimeWindow::Week,
        TimeWindow::Month,
        TimeWindow::Year,
        TimeWindow::All,
    ];

    /// Value of the `t` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeWindow::ALL
            .into_iter()
            .find(|window| window.as_str() == s)
            .ok_or_else(|| CoreError::InvalidInput {
                message: format!("unknown time window '{}'", s),
            })
    }
}

/// A sort mode together with the time window it is scoped by, if any.
///
/// The window is normalised on construction: it is dropped for modes that
/// don't take one, and defaults to [`TimeWindow::All`] for modes that do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Listing {
    sort: SortMode,
    window: Option<TimeWindow>,
}

impl Listing {
    pub fn new(sort: SortMode, window: Option<TimeWindow>) -> Self {
        let window = if sort.uses_time_window() {
            Some(window.unwrap_or(TimeWindow::All))
        } else {
            if let Some(ignored) = window {
                tracing::debug!("Ignoring time window '{}' for '{}' listing", ignored, sort);
            }
            None
        };
        Self { sort, window }
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.window
    }
}

impl From<SortMode> for Listing {
    fn from(sort: SortMode) -> Self {
        Listing::new(sort, None)
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.window {
            Some(window) => write!(f, "{}:{}", self.sort, window),
            None => write!(f, "{}", self.sort),
        }
    }
}

/// Parses `mode` or `mode:window`, e.g. `hot` or `top:week`.
impl FromStr for Listing {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some((sort, window)) => Ok(Listing::new(sort.parse()?, Some(window.parse()?))),
            None => Ok(Listing::new(s.parse()?, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_with_url(url: &str) -> Post {
        Post {
            id: "abc".to_string(),
            title: "title".to_string(),
            subreddit: "pics".to_string(),
            url: url.to_string(),
            created_utc: None,
        }
    }

    #[test]
    fn test_image_url_suffixes() {
        assert!(post_with_url("https://i.redd.it/cat.jpg").has_image_url());
        assert!(post_with_url("https://i.redd.it/cat.jpeg").has_image_url());
        assert!(post_with_url("https://i.redd.it/dog.png").has_image_url());
        assert!(post_with_url("https://i.imgur.com/loop.gif").has_image_url());

        assert!(!post_with_url("https://i.redd.it/cat.JPG").has_image_url());
        assert!(!post_with_url("https://v.redd.it/clip.mp4").has_image_url());
        assert!(!post_with_url("https://i.redd.it/cat.jpg?width=640").has_image_url());
        assert!(!post_with_url("https://www.reddit.com/r/pics/comments/abc").has_image_url());
    }

    #[test]
    fn test_window_dropped_for_plain_modes() {
        let listing = Listing::new(SortMode::New, Some(TimeWindow::Week));
        assert_eq!(listing.sort(), SortMode::New);
        assert_eq!(listing.window(), None);
    }

    #[test]
    fn test_window_defaults_to_all() {
        let listing = Listing::new(SortMode::Controversial, None);
        assert_eq!(listing.window(), Some(TimeWindow::All));

        let listing = Listing::new(SortMode::Top, Some(TimeWindow::Day));
        assert_eq!(listing.window(), Some(TimeWindow::Day));
    }

    #[test]
    fn test_listing_parsing() {
        assert_eq!("hot".parse::<Listing>().unwrap(), Listing::from(SortMode::Hot));
        assert_eq!(
            "top:year".parse::<Listing>().unwrap(),
            Listing::new(SortMode::Top, Some(TimeWindow::Year))
        );
        assert_eq!(
            "rising:day".parse::<Listing>().unwrap(),
            Listing::from(SortMode::Rising)
        );
        assert_eq!(
            "controversial".parse::<Listing>().unwrap().to_string(),
            "controversial:all"
        );
    }

    #[test]
    fn test_invalid_listing_fails_fast() {
        let err = "best".parse::<Listing>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));

        let err = "top:decade".parse::<Listing>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));

        assert!("Hot".parse::<SortMode>().is_err());
    }
}
