//! Client payload formatting and publication fanout

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{Config, PublicationTarget};
use crate::error::Result;
use crate::record::TrendingRecord;

/// One article as the client app sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientArticle {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&TrendingRecord> for ClientArticle {
    fn from(record: &TrendingRecord) -> Self {
        Self {
            title: record.display_title(),
            description: record.description.clone().filter(|d| !d.is_empty()),
            image_url: record.image_url.clone().filter(|u| !u.is_empty()),
        }
    }
}

/// JSON array of client articles, ordered by rank
pub fn page_content(records: &[TrendingRecord]) -> Result<String> {
    let mut ordered: Vec<&TrendingRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.rank);
    let articles: Vec<ClientArticle> = ordered.into_iter().map(ClientArticle::from).collect();
    Ok(serde_json::to_string(&articles)?)
}

/// Edit summary naming the day the data comes from
pub fn edit_summary(date: NaiveDate) -> String {
    format!("Update with trending articles from {}", date.format("%Y-%m-%d"))
}

/// Writes content to an existing wiki page
pub trait PagePublisher {
    /// Replace the text of `page_title`. Must fail rather than create a
    /// page that does not exist.
    fn publish(&self, page_title: &str, content: &str, summary: &str) -> Result<()>;
}

/// Logs what would be published instead of editing
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPublisher;

impl PagePublisher for DryRunPublisher {
    fn publish(&self, page_title: &str, content: &str, summary: &str) -> Result<()> {
        tracing::info!("[dry run] {} ({}): {}", page_title, summary, content);
        Ok(())
    }
}

/// Result of publishing one country's list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Page titles that were updated
    pub published: Vec<String>,
    /// Page titles that failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl FanoutReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Publish the same content to every page configured for a country.
///
/// A failure on one page is recorded and the remaining pages are still
/// attempted.
pub fn fanout<P: PagePublisher + ?Sized>(
    publisher: &P,
    config: &Config,
    target: &PublicationTarget,
    date: NaiveDate,
    content: &str,
) -> FanoutReport {
    let summary = edit_summary(date);
    let mut report = FanoutReport::default();

    for page in &target.pages {
        let title = config.page_title(page);
        match publisher.publish(&title, content, &summary) {
            Ok(()) => {
                tracing::info!("Published {} list to {}", target.country, title);
                report.published.push(title);
            }
            Err(e) => {
                tracing::error!("Failed to publish {} list to {}: {}", target.country, title, e);
                report.failed.push((title, e.to_string()));
            }
        }
    }

    report
}
