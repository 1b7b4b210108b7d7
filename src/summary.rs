//! Page summary enrichment

use serde::Deserialize;

use crate::error::Result;
use crate::record::{Enrichment, TrendingRecord};

/// Looks up display data for an article
pub trait SummaryLookup {
    fn summarize(&self, article: &str) -> Result<Enrichment>;
}

/// Response body of the REST `page/summary` endpoint (the fields we use)
#[derive(Debug, Clone, Deserialize)]
pub struct PageSummary {
    /// Display title; the redirect target when the request was a redirect
    pub title: String,
    /// Empty when the page has no extract
    #[serde(default)]
    pub extract_html: String,
    #[serde(default)]
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub source: String,
}

impl From<PageSummary> for Enrichment {
    fn from(summary: PageSummary) -> Self {
        Enrichment {
            title: summary.title,
            description: Some(summary.extract_html).filter(|html| !html.is_empty()),
            image_url: summary.thumbnail.map(|t| t.source).filter(|src| !src.is_empty()),
        }
    }
}

/// Path of the summary endpoint for an article, relative to the REST base URL
pub fn summary_path(article: &str) -> String {
    // Slashes and question marks are legal in titles, so nothing is left unescaped
    format!("page/summary/{}", urlencoding::encode(article))
}

/// Enrich records one at a time.
///
/// Lookups are best-effort: a failure is logged and the record keeps only the
/// fields it already has. Returns the number of failed lookups.
pub fn enrich_records<L: SummaryLookup + ?Sized>(lookup: &L, records: &mut [TrendingRecord]) -> usize {
    let mut failures = 0;
    for record in records.iter_mut() {
        match lookup.summarize(&record.article) {
            Ok(enrichment) => record.enrich(&enrichment),
            Err(e) => {
                failures += 1;
                tracing::warn!("Summary lookup failed for {}: {}; publishing without it", record.article, e);
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::error::TrendError;

    #[test]
    fn test_summary_with_all_fields() {
        let summary: PageSummary = serde_json::from_str(
            r#"{
                "title": "Burna Boy",
                "extract_html": "<p><b>Damini Ebunoluwa Ogulu</b> is a Nigerian singer.</p>",
                "thumbnail": {"source": "https://upload.example/b.jpg", "width": 320, "height": 240}
            }"#,
        )
        .unwrap();

        let enrichment = Enrichment::from(summary);
        assert_eq!(enrichment.title, "Burna Boy");
        assert!(enrichment.description.unwrap().contains("Nigerian singer"));
        assert_eq!(enrichment.image_url.as_deref(), Some("https://upload.example/b.jpg"));
    }

    #[test]
    fn test_summary_without_extract_or_thumbnail() {
        let summary: PageSummary = serde_json::from_str(r#"{"title": "Lagos State", "extract_html": ""}"#).unwrap();
        let enrichment = Enrichment::from(summary);
        assert_eq!(enrichment.description, None);
        assert_eq!(enrichment.image_url, None);
    }

    #[test]
    fn test_summary_path_escapes_everything() {
        assert_eq!(summary_path("AC/DC"), "page/summary/AC%2FDC");
        assert_eq!(summary_path("What?_(film)"), "page/summary/What%3F_%28film%29");
    }

    struct PartialLookup;

    impl SummaryLookup for PartialLookup {
        fn summarize(&self, article: &str) -> Result<Enrichment> {
            if article == "Broken" {
                return Err(TrendError::Summary {
                    article: article.to_string(),
                    message: "503".to_string(),
                });
            }
            Ok(Enrichment {
                title: article.replace('_', " "),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_enrich_records_is_best_effort() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let mut records = vec![
            TrendingRecord::new(date, "IN", "Broken", 1),
            TrendingRecord::new(date, "IN", "Virat_Kohli", 2),
        ];

        let failures = enrich_records(&PartialLookup, &mut records);

        assert_eq!(failures, 1);
        assert_eq!(records[0].title, None);
        assert_eq!(records[0].display_title(), "Broken");
        assert_eq!(records[1].title.as_deref(), Some("Virat Kohli"));
    }
}
