//! Runtime configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment overrides. Reddit credentials are only ever read from the
//! environment.

use crate::error::{ConfigError, CoreError};
use crate::types::{Listing, SortMode, TimeWindow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "SUBGRAB_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "subgrab.toml";
pub const DEFAULT_SUBREDDIT: &str = "EnterSubredditNameHere";
pub const DEFAULT_USER_AGENT: &str = concat!("subgrab/", env!("CARGO_PKG_VERSION"));

/// Listing order used when no plan is configured: the plain modes first, then
/// top and controversial for every time window.
pub fn default_listings() -> Vec<Listing> {
    let mut listings = vec![
        Listing::from(SortMode::Hot),
        Listing::from(SortMode::New),
        Listing::from(SortMode::Rising),
    ];
    for window in TimeWindow::ALL {
        listings.push(Listing::new(SortMode::Top, Some(window)));
        listings.push(Listing::new(SortMode::Controversial, Some(window)));
    }
    listings
}

#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl RedditCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var_name: &str| {
            lookup(var_name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                    var_name: var_name.to_string(),
                })
        };

        Ok(Self {
            client_id: required("REDDIT_CLIENT_ID")?,
            client_secret: required("REDDIT_CLIENT_SECRET")?,
            username: required("REDDIT_USERNAME")?,
            password: required("REDDIT_PASSWORD")?,
            user_agent: lookup("REDDIT_USER_AGENT")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    subreddit: Option<String>,
    output_dir: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    download_timeout_secs: Option<u64>,
    api_timeout_secs: Option<u64>,
    listings: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub subreddit: String,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub download_timeout: Duration,
    pub api_timeout: Duration,
    pub listings: Vec<Listing>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            subreddit: DEFAULT_SUBREDDIT.to_string(),
            output_dir: PathBuf::from("output"),
            state_dir: PathBuf::from("."),
            download_timeout: Duration::from_secs(10),
            api_timeout: Duration::from_secs(30),
            listings: default_listings(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, CoreError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] but reads variables through `lookup`.
    pub fn load_with<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        match lookup(CONFIG_PATH_VAR) {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    }
                    .into());
                }
                config.merge_file(&path)?;
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    config.merge_file(path)?;
                }
            }
        }

        if let Some(subreddit) = lookup("SUBGRAB_SUBREDDIT") {
            config.subreddit = subreddit;
        }
        if let Some(output_dir) = lookup("SUBGRAB_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(output_dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let mut config = Self::default();
        config.merge_toml(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), CoreError> {
        tracing::debug!("Loading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        self.merge_toml(&contents)
    }

    fn merge_toml(&mut self, contents: &str) -> Result<(), CoreError> {
        let file: FileConfig = toml::from_str(contents).map_err(ConfigError::Parse)?;

        if let Some(subreddit) = file.subreddit {
            self.subreddit = subreddit;
        }
        if let Some(output_dir) = file.output_dir {
            self.output_dir = output_dir;
        }
        if let Some(state_dir) = file.state_dir {
            self.state_dir = state_dir;
        }
        if let Some(secs) = file.download_timeout_secs {
            self.download_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.api_timeout_secs {
            self.api_timeout = Duration::from_secs(secs);
        }
        if let Some(listings) = file.listings {
            self.listings = listings
                .iter()
                .map(|raw| {
                    raw.parse::<Listing>().map_err(|_| ConfigError::InvalidValue {
                        field: "listings".to_string(),
                        value: raw.clone(),
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid_name = !self.subreddit.is_empty()
            && self
                .subreddit
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(ConfigError::InvalidValue {
                field: "subreddit".to_string(),
                value: self.subreddit.clone(),
            });
        }
        if self.download_timeout.is_zero() || self.api_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed {
                reason: "timeouts must be greater than zero".to_string(),
            });
        }
        if self.listings.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one listing is required".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_listing_order() {
        let listings: Vec<String> = default_listings().iter().map(|l| l.to_string()).collect();
        assert_eq!(listings.len(), 13);
        assert_eq!(&listings[..3], ["hot", "new", "rising"]);
        assert_eq!(listings[3], "top:day");
        assert_eq!(listings[4], "controversial:day");
        assert_eq!(listings[12], "controversial:all");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            subreddit = "EarthPorn"
            output_dir = "/tmp/images"
            download_timeout_secs = 5
            listings = ["new", "top:week"]
            "#,
        )
        .unwrap();

        assert_eq!(config.subreddit, "EarthPorn");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/images"));
        assert_eq!(config.state_dir, PathBuf::from("."));
        assert_eq!(config.download_timeout, Duration::from_secs(5));
        assert_eq!(config.api_timeout, Duration::from_secs(30));
        assert_eq!(
            config.listings,
            vec![
                Listing::from(SortMode::New),
                Listing::new(SortMode::Top, Some(TimeWindow::Week))
            ]
        );
    }

    #[test]
    fn test_invalid_listing_in_file() {
        let err = AppConfig::from_toml_str(r#"listings = ["hot", "best"]"#).unwrap_err();
        match err {
            CoreError::Config(ConfigError::InvalidValue { field, value }) => {
                assert_eq!(field, "listings");
                assert_eq!(value, "best");
            }
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = AppConfig::from_toml_str("threads = 4").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = AppConfig::from_toml_str("download_timeout_secs = 0").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_load_with_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subgrab.toml");
        std::fs::write(&path, "subreddit = \"wallpapers\"\nstate_dir = \"state\"\n").unwrap();
        let path_str = path.display().to_string();

        let config = AppConfig::load_with(lookup_from(&[
            (CONFIG_PATH_VAR, &path_str),
            ("SUBGRAB_SUBREDDIT", "pics"),
        ]))
        .unwrap();

        assert_eq!(config.subreddit, "pics");
        assert_eq!(config.state_dir, PathBuf::from("state"));
    }

    #[test]
    fn test_load_with_missing_explicit_file() {
        let err = AppConfig::load_with(lookup_from(&[(
            CONFIG_PATH_VAR,
            "/definitely/not/here/subgrab.toml",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_subreddit_name() {
        let err = AppConfig::from_toml_str(r#"subreddit = "../etc""#).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_credentials_from_lookup() {
        let creds = RedditCredentials::from_lookup(lookup_from(&[
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "user"),
            ("REDDIT_PASSWORD", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.user_agent, DEFAULT_USER_AGENT);
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_missing_credentials() {
        let err = RedditCredentials::from_lookup(lookup_from(&[
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", ""),
        ]))
        .unwrap_err();

        match err {
            ConfigError::MissingEnvironmentVariable { var_name } => {
                assert_eq!(var_name, "REDDIT_CLIENT_SECRET")
            }
            other => panic!("Expected MissingEnvironmentVariable, got {other:?}"),
        }
    }
}
