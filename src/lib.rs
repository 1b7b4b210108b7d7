//! # Trendwiki
//!
//! Publish the most-read trending Wikipedia articles per country and day.
//!
//! This crate provides tools to:
//! - Ask an analytics engine for ranked trending candidates of a country-day
//! - Exclude permanently blocklisted articles and recently prominent ones
//! - Enrich each article with a title, extract and thumbnail
//! - Publish a compact JSON list to one or more wiki pages per country
//! - Keep a CSV archive of everything published
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a config file with the default country lists
//! trendwiki-run init-config
//!
//! # Publish yesterday's lists
//! TRENDWIKI_OAUTH_TOKEN=... trendwiki-run run
//!
//! # Preview a specific day without editing anything
//! trendwiki-run run --date 2021-03-07 --dry-run
//! ```

pub mod archive;
pub mod blocklist;
pub mod config;
pub mod driver;
pub mod error;
pub mod lock;
pub mod publish;
pub mod query;
pub mod recency;
pub mod record;
pub mod selector;
pub mod session;
pub mod summary;

pub use archive::{Archive, ArchiveSource};
pub use blocklist::{sql_tuple, ArticleSet, Blocklist};
pub use config::{Config, PublicationTarget};
pub use driver::{CountryOutcome, CountryReport, RunDriver, RunReport};
pub use error::{Result, TrendError};
pub use lock::RunLock;
pub use publish::{ClientArticle, DryRunPublisher, FanoutReport, PagePublisher};
pub use query::{CandidateQuery, CommandQueryEngine, QueryTemplate, TrendingSource};
pub use recency::{RecencyFilter, RECENT_RANK_THRESHOLD, RECENT_WINDOW_DAYS};
pub use record::{Enrichment, TrendingRecord};
pub use selector::CandidateSelector;
pub use session::{Credentials, HttpApi, WikiApi, WikiSession};
pub use summary::SummaryLookup;
