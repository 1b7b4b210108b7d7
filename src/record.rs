//! Trending record data structures

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One article's trending result for one country-day.
///
/// `(date, country, rank)` identifies a record; the enrichment fields are
/// filled in after selection and never take part in the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingRecord {
    /// Day the record pertains to
    #[serde(deserialize_with = "deserialize_day")]
    pub date: NaiveDate,
    /// Country code of the readership population
    pub country: String,
    /// Canonical article identifier (underscores, not spaces)
    pub article: String,
    /// Trending position within (date, country), starting at 1
    pub rank: u32,
    /// Display title from the summary service
    #[serde(default)]
    pub title: Option<String>,
    /// Extract HTML, absent when the summary had none
    #[serde(default)]
    pub description: Option<String>,
    /// Thumbnail URL
    #[serde(default)]
    pub image_url: Option<String>,
}

impl TrendingRecord {
    /// Create an unenriched record
    pub fn new(date: NaiveDate, country: impl Into<String>, article: impl Into<String>, rank: u32) -> Self {
        Self {
            date,
            country: country.into(),
            article: article.into(),
            rank,
            title: None,
            description: None,
            image_url: None,
        }
    }

    /// Archive key
    pub fn key(&self) -> (NaiveDate, &str, u32) {
        (self.date, self.country.as_str(), self.rank)
    }

    /// Title to show readers, falling back to the identifier with spaces
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => self.article.replace('_', " "),
        }
    }

    /// Apply a summary lookup result
    pub fn enrich(&mut self, summary: &Enrichment) {
        self.title = Some(summary.title.clone());
        self.description = summary.description.clone();
        self.image_url = summary.image_url.clone();
    }
}

/// Fields the summary service contributes to a record.
///
/// Every optional attribute is an explicit `Option`; an article without a
/// thumbnail is a normal `None`, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    /// Display title (the redirect target if the identifier was a redirect)
    pub title: String,
    /// Non-empty extract HTML
    pub description: Option<String>,
    /// Thumbnail source URL
    pub image_url: Option<String>,
}

/// Accepts `YYYY-MM-DD` as well as timestamps such as `YYYY-MM-DD 00:00:00`
/// left behind by older archive writers.
fn deserialize_day<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let day = raw.trim().get(..10).unwrap_or(raw.trim());
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
}
