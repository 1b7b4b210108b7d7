//! Trendwiki Config

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blocklist::Blocklist;
use crate::error::{Result, TrendError};

/// Articles that are never recommended, whatever their trending signal
pub const DEFAULT_BLOCKLIST: &[&str] = &[
    "-",
    ".xxx",
    "Brazzers",
    "Main_Page",
    "News",
    "Pornography",
    "Sex",
    "XHamster",
    "XVideos",
    "XXX",
    "XXX_(film_series)",
    "XXX:_Return_of_Xander_Cage",
    "XXXTentacion",
    "XXXX",
];

/// Wrapper that feeds the query to `spark3-sql` and converts its output to CSV
pub const DEFAULT_QUERY_SCRIPT: &str = "scripts/trending_query.sh";

/// One country's trending list and the pages it is published to.
///
/// The first page is normally the country's own production page; the rest
/// are test or proxy pages that receive the same list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationTarget {
    /// Source country of the trending list
    pub country: String,
    /// Destination page identifiers
    pub pages: Vec<String>,
}

impl PublicationTarget {
    pub fn new<I, S>(country: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            country: country.into(),
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CSV archive of past published results
    pub archive_path: PathBuf,
    /// SQL template for the trending query
    pub query_file: PathBuf,
    /// Program (and arguments) that runs a query read from stdin and prints
    /// CSV with a `date,country,article,rank` header. The default wraps
    /// `spark3-sql` with `scripts/trending_query.sh`, relative to the working
    /// directory.
    pub query_command: Vec<String>,
    /// How long one country's query may run before it is killed
    pub query_timeout_secs: u64,
    /// Countries to process, in order, with their destination pages
    pub lists: Vec<PublicationTarget>,
    /// Permanently banned article identifiers
    pub blocklist: Vec<String>,
    /// Prefix of every destination page title
    pub page_prefix: String,
    /// Base URL of the REST API serving page summaries
    pub rest_api_url: String,
    /// Action API endpoint used for edits
    pub action_api_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Advisory lock file held while a run is in progress
    pub lock_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_path: PathBuf::from("trending_articles.csv"),
            query_file: PathBuf::from("trending_articles_for_country_day.sql"),
            query_command: vec!["sh".to_string(), DEFAULT_QUERY_SCRIPT.to_string()],
            query_timeout_secs: 3600,
            lists: vec![
                PublicationTarget::new("IN", ["IN"]),
                PublicationTarget::new("NG", ["NG", "KE", "PT"]),
                PublicationTarget::new("PK", ["PK", "DE"]),
                PublicationTarget::new("TZ", ["TZ", "US", "PR"]),
                PublicationTarget::new("UG", ["UG", "CA"]),
            ],
            blocklist: DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect(),
            page_prefix: "Wikipedia_for_KaiOS/engagement1/trending/en/".to_string(),
            rest_api_url: "https://en.wikipedia.org/api/rest_v1/".to_string(),
            action_api_url: "https://www.mediawiki.org/w/api.php".to_string(),
            user_agent: format!("trendwiki/{} (trending articles bot)", env!("CARGO_PKG_VERSION")),
            timeout_secs: 60,
            lock_path: None,
        }
    }
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the archive path
    pub fn with_archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = path.into();
        self
    }

    /// Set the publication lists
    pub fn with_lists(mut self, lists: Vec<PublicationTarget>) -> Self {
        self.lists = lists;
        self
    }

    /// Set the blocklist
    pub fn with_blocklist<I, S>(mut self, articles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocklist = articles.into_iter().map(Into::into).collect();
        self
    }

    /// Blocklist as a filter
    pub fn blocklist(&self) -> Blocklist {
        Blocklist::new(self.blocklist.iter().cloned())
    }

    /// Full title of a destination page
    pub fn page_title(&self, page: &str) -> String {
        format!("{}{}", self.page_prefix, page.to_lowercase())
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Query timeout
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Load config from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrendError::Config(format!("cannot read {:?}: {}", path, e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| TrendError::Config(format!("invalid config {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or use defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.lists.is_empty() {
            return Err(TrendError::Config("at least one country list is required".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for target in &self.lists {
            if target.country.trim().is_empty() {
                return Err(TrendError::Config("country code cannot be empty".into()));
            }
            if !seen.insert(target.country.as_str()) {
                return Err(TrendError::Config(format!("country {} is listed twice", target.country)));
            }
            if target.pages.is_empty() {
                return Err(TrendError::Config(format!("country {} has no pages", target.country)));
            }
            if target.pages.iter().any(|p| p.trim().is_empty()) {
                return Err(TrendError::Config(format!("country {} has a blank page id", target.country)));
            }
        }

        if self.query_command.is_empty() {
            return Err(TrendError::Config("query_command cannot be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(TrendError::Config("timeout_secs must be at least 1".into()));
        }
        if self.query_timeout_secs == 0 {
            return Err(TrendError::Config("query_timeout_secs must be at least 1".into()));
        }

        for (name, url) in [("rest_api_url", &self.rest_api_url), ("action_api_url", &self.action_api_url)] {
            reqwest::Url::parse(url)
                .map_err(|e| TrendError::Config(format!("{} {:?} is not a valid URL: {}", name, url, e)))?;
        }

        Ok(())
    }
}
