//! Recency suppression
//!
//! An article that ranked in the top [`RECENT_RANK_THRESHOLD`] for a country
//! during the [`RECENT_WINDOW_DAYS`] days before the target date is not
//! offered again. Lower-ranked appearances (6 and below) do not count, so a
//! minor trend may show up again the next day.

use chrono::{Duration, NaiveDate};

use crate::archive::Archive;
use crate::blocklist::ArticleSet;

/// Length of the lookback window in days
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Highest rank that counts as a prominent appearance
pub const RECENT_RANK_THRESHOLD: u32 = 5;

/// Derives per-country exclusion sets from the archive
#[derive(Debug, Clone, Copy)]
pub struct RecencyFilter<'a> {
    archive: Option<&'a Archive>,
}

impl<'a> RecencyFilter<'a> {
    /// Filter backed by an archive snapshot; `None` on the first ever run
    pub fn new(archive: Option<&'a Archive>) -> Self {
        Self { archive }
    }

    /// First day of the lookback window for `date`
    pub fn window_start(date: NaiveDate) -> NaiveDate {
        date - Duration::days(RECENT_WINDOW_DAYS)
    }

    /// Articles to exclude for `country` on `date`.
    ///
    /// Looks at `[date - 7 days, date)`; rows dated `date` itself never count.
    /// Returns `None` when nothing qualifies, including when there is no
    /// archive at all.
    pub fn exclusions(&self, country: &str, date: NaiveDate) -> Option<ArticleSet> {
        let archive = self.archive?;

        let set: ArticleSet = archive
            .records_between(country, Self::window_start(date), date)
            .filter(|record| record.rank <= RECENT_RANK_THRESHOLD)
            .map(|record| record.article.clone())
            .collect();

        if set.is_empty() {
            None
        } else {
            tracing::debug!("{} recently trending articles excluded for {} on {}", set.len(), country, date);
            Some(set)
        }
    }
}
