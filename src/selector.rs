//! Candidate selection for one country-day

use chrono::NaiveDate;

use crate::blocklist::{ArticleSet, Blocklist};
use crate::error::{Result, TrendError};
use crate::query::{CandidateQuery, TrendingSource};
use crate::recency::RecencyFilter;
use crate::record::TrendingRecord;

/// Builds the query for a country-day and checks what comes back
pub struct CandidateSelector<'a, S: TrendingSource + ?Sized> {
    source: &'a S,
    blocklist: &'a Blocklist,
}

impl<'a, S: TrendingSource + ?Sized> CandidateSelector<'a, S> {
    pub fn new(source: &'a S, blocklist: &'a Blocklist) -> Self {
        Self { source, blocklist }
    }

    /// Query handed to the engine
    pub fn query(&self, country: &str, date: NaiveDate, recent: Option<&ArticleSet>) -> CandidateQuery {
        CandidateQuery {
            country: country.to_string(),
            date,
            blocklist: self.blocklist.sql_tuple(),
            recently_trending: recent.and_then(ArticleSet::sql_tuple),
        }
    }

    /// Ranked candidates for `country` on `date`.
    ///
    /// Engine failures and malformed output are errors; an empty list is only
    /// returned when the engine really produced no rows.
    pub fn select(&self, country: &str, date: NaiveDate, recency: &RecencyFilter<'_>) -> Result<Vec<TrendingRecord>> {
        let recent = recency.exclusions(country, date);
        let query = self.query(country, date, recent.as_ref());

        tracing::info!(
            "Querying trending articles for {} on {} ({} recent exclusions)",
            country,
            date,
            recent.as_ref().map_or(0, ArticleSet::len)
        );

        let rows = self.source.fetch(&query)?;
        validate_rows(&rows, country, date)?;

        // The engine applies both exclusions itself; a leaked row means its
        // output cannot be trusted, and dropping it would leave a rank gap.
        for row in &rows {
            if self.blocklist.is_blocked(&row.article) {
                return Err(TrendError::Query(format!(
                    "engine returned blocklisted article {} at rank {} for {} on {}",
                    row.article, row.rank, country, date
                )));
            }
            if recent.as_ref().is_some_and(|set| set.contains(&row.article)) {
                return Err(TrendError::Query(format!(
                    "engine returned recently trending article {} at rank {} for {} on {}",
                    row.article, row.rank, country, date
                )));
            }
        }

        tracing::info!("{} candidates for {} on {}", rows.len(), country, date);
        Ok(rows)
    }
}

/// Every row must belong to the requested country-day, with ranks 1..=n in order
fn validate_rows(rows: &[TrendingRecord], country: &str, date: NaiveDate) -> Result<()> {
    for (i, row) in rows.iter().enumerate() {
        if row.country != country || row.date != date {
            return Err(TrendError::Query(format!(
                "row for {} on {} returned for {} on {}",
                row.country, row.date, country, date
            )));
        }
        let expected = i as u32 + 1;
        if row.rank != expected {
            return Err(TrendError::Query(format!(
                "rank {} found where {} was expected for {} on {}",
                row.rank, expected, country, date
            )));
        }
    }
    Ok(())
}
