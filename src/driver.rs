//! Run driver
//!
//! Processes every configured country for one date: select, enrich, publish,
//! then fold the results into the archive. A country whose query fails is
//! reported and skipped; the remaining countries still run, and the archive is
//! written once at the end with whatever succeeded.

use std::path::Path;

use chrono::NaiveDate;

use crate::archive::Archive;
use crate::config::{Config, PublicationTarget};
use crate::error::Result;
use crate::publish::{fanout, page_content, FanoutReport, PagePublisher};
use crate::query::TrendingSource;
use crate::recency::RecencyFilter;
use crate::selector::CandidateSelector;
use crate::summary::{enrich_records, SummaryLookup};

/// What happened to one country
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryOutcome {
    /// Records were selected, published (possibly partially) and archived
    Completed {
        records: usize,
        enrichment_failures: usize,
        fanout: FanoutReport,
    },
    /// Nothing was archived for this country
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryReport {
    pub country: String,
    pub outcome: CountryOutcome,
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub date: NaiveDate,
    pub countries: Vec<CountryReport>,
}

impl RunReport {
    /// Countries that failed outright
    pub fn failed_countries(&self) -> impl Iterator<Item = &CountryReport> {
        self.countries
            .iter()
            .filter(|c| matches!(c.outcome, CountryOutcome::Failed(_)))
    }

    /// Page titles that could not be updated
    pub fn failed_pages(&self) -> impl Iterator<Item = &(String, String)> {
        self.countries
            .iter()
            .filter_map(|c| match &c.outcome {
                CountryOutcome::Completed { fanout, .. } => Some(fanout),
                CountryOutcome::Failed(_) => None,
            })
            .flat_map(|fanout| fanout.failed.iter())
    }

    /// True when any country or page failed
    pub fn has_failures(&self) -> bool {
        self.failed_countries().next().is_some() || self.failed_pages().next().is_some()
    }

    /// Log one line per country
    pub fn log(&self) {
        for report in &self.countries {
            match &report.outcome {
                CountryOutcome::Completed { records, enrichment_failures, fanout } => tracing::info!(
                    "{}: {} articles, {} summaries missing, {} pages published, {} pages failed",
                    report.country,
                    records,
                    enrichment_failures,
                    fanout.published.len(),
                    fanout.failed.len()
                ),
                CountryOutcome::Failed(message) => tracing::error!("{}: failed: {}", report.country, message),
            }
        }
    }
}

/// Sequences the per-country work against external collaborators
pub struct RunDriver<'a> {
    config: &'a Config,
    source: &'a dyn TrendingSource,
    lookup: &'a dyn SummaryLookup,
    publisher: &'a dyn PagePublisher,
}

impl<'a> RunDriver<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn TrendingSource,
        lookup: &'a dyn SummaryLookup,
        publisher: &'a dyn PagePublisher,
    ) -> Self {
        Self {
            config,
            source,
            lookup,
            publisher,
        }
    }

    /// Process every configured country for `date`, growing `archive`
    pub fn run(&self, archive: &mut Archive, date: NaiveDate) -> RunReport {
        tracing::info!("Updating trending lists for {} ({} countries)", date, self.config.lists.len());

        let mut countries = Vec::with_capacity(self.config.lists.len());
        for target in &self.config.lists {
            let outcome = match self.run_country(archive, target, date) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Skipping {} for {}: {}", target.country, date, e);
                    CountryOutcome::Failed(e.to_string())
                }
            };
            countries.push(CountryReport {
                country: target.country.clone(),
                outcome,
            });
        }

        RunReport { date, countries }
    }

    fn run_country(&self, archive: &mut Archive, target: &PublicationTarget, date: NaiveDate) -> Result<CountryOutcome> {
        let blocklist = self.config.blocklist();
        let mut records = {
            let recency = RecencyFilter::new(Some(&*archive).filter(|a| !a.is_empty()));
            CandidateSelector::new(self.source, &blocklist).select(&target.country, date, &recency)?
        };

        let enrichment_failures = enrich_records(self.lookup, &mut records);
        let content = page_content(&records)?;
        let fanout = fanout(self.publisher, self.config, target, date, &content);

        let count = records.len();
        let removed = archive.replace_day(&target.country, date, records);
        if removed > 0 {
            tracing::info!("Replaced {} existing archive rows for {} on {}", removed, target.country, date);
        }

        Ok(CountryOutcome::Completed {
            records: count,
            enrichment_failures,
            fanout,
        })
    }

    /// Load the archive, run, and rewrite the archive.
    ///
    /// The archive is written even when some countries failed; only an
    /// archive that cannot be read or written is an error.
    pub fn run_and_persist(&self, archive_path: &Path, date: NaiveDate) -> Result<RunReport> {
        let mut archive = Archive::load_or_empty(archive_path)?;
        let report = self.run(&mut archive, date);
        archive.save(archive_path)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::error::TrendError;
    use crate::query::CandidateQuery;
    use crate::record::{Enrichment, TrendingRecord};

    struct ScriptedSource;

    impl TrendingSource for ScriptedSource {
        fn fetch(&self, query: &CandidateQuery) -> Result<Vec<TrendingRecord>> {
            match query.country.as_str() {
                "PK" => Err(TrendError::Query("timeout".into())),
                country => Ok(vec![
                    TrendingRecord::new(query.date, country, format!("{}_Top", country), 1),
                    TrendingRecord::new(query.date, country, format!("{}_Next", country), 2),
                ]),
            }
        }
    }

    struct TitleLookup;

    impl SummaryLookup for TitleLookup {
        fn summarize(&self, article: &str) -> Result<Enrichment> {
            Ok(Enrichment {
                title: article.replace('_', " "),
                description: None,
                image_url: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        pages: RefCell<Vec<(String, String)>>,
    }

    impl PagePublisher for RecordingPublisher {
        fn publish(&self, page_title: &str, content: &str, _summary: &str) -> Result<()> {
            self.pages.borrow_mut().push((page_title.to_string(), content.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_failed_country_does_not_stop_the_rest() {
        let config = Config::default().with_lists(vec![
            PublicationTarget::new("IN", ["IN"]),
            PublicationTarget::new("PK", ["PK", "DE"]),
            PublicationTarget::new("UG", ["UG", "CA"]),
        ]);
        let publisher = RecordingPublisher::default();
        let driver = RunDriver::new(&config, &ScriptedSource, &TitleLookup, &publisher);
        let date = NaiveDate::from_ymd_opt(2021, 8, 1).unwrap();

        let mut archive = Archive::new();
        let report = driver.run(&mut archive, date);

        assert!(report.has_failures());
        let failed: Vec<_> = report.failed_countries().map(|c| c.country.as_str()).collect();
        assert_eq!(failed, vec!["PK"]);
        assert_eq!(archive.len(), 4);
        assert!(archive.day("PK", date).is_empty());

        let pages: Vec<_> = publisher.pages.borrow().iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(
            pages,
            vec![config.page_title("IN"), config.page_title("UG"), config.page_title("CA")]
        );
        assert_eq!(publisher.pages.borrow()[0].1, r#"[{"title":"IN Top"},{"title":"IN Next"}]"#);
    }

    #[test]
    fn test_clean_run_has_no_failures() {
        let config = Config::default().with_lists(vec![PublicationTarget::new("NG", ["NG", "KE"])]);
        let publisher = RecordingPublisher::default();
        let driver = RunDriver::new(&config, &ScriptedSource, &TitleLookup, &publisher);

        let mut archive = Archive::new();
        let report = driver.run(&mut archive, NaiveDate::from_ymd_opt(2021, 8, 1).unwrap());

        assert!(!report.has_failures());
        assert_eq!(report.failed_pages().count(), 0);
        match &report.countries[0].outcome {
            CountryOutcome::Completed { records, fanout, .. } => {
                assert_eq!(*records, 2);
                assert_eq!(fanout.published.len(), 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
