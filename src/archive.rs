//! Archive of previously published trending records
//!
//! The archive is a CSV file with one row per `(date, country, rank)`. It is
//! loaded once at the start of a run, grown in memory, and rewritten in full
//! (sorted, deduplicated) at the end.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{Result, TrendError};
use crate::record::TrendingRecord;

/// Column order of the archive file
pub const ARCHIVE_COLUMNS: [&str; 7] = [
    "date",
    "country",
    "article",
    "rank",
    "title",
    "description",
    "image_url",
];

/// Outcome of reading the archive file
#[derive(Debug)]
pub enum ArchiveSource {
    /// The file existed and parsed
    Loaded(Archive),
    /// No archive file yet (first run)
    NotFound,
}

impl ArchiveSource {
    /// Treat a missing file as an empty archive
    pub fn into_archive(self) -> Archive {
        match self {
            ArchiveSource::Loaded(archive) => archive,
            ArchiveSource::NotFound => Archive::new(),
        }
    }
}

type Key = (NaiveDate, String, u32);

/// In-memory archive, keyed by `(date, country, rank)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    records: BTreeMap<Key, TrendingRecord>,
}

impl Archive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the archive file.
    ///
    /// Only a missing file maps to [`ArchiveSource::NotFound`]; any other I/O
    /// failure or a malformed row is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<ArchiveSource> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No archive at {:?}, starting fresh", path);
                return Ok(ArchiveSource::NotFound);
            }
            Err(e) => {
                return Err(TrendError::Archive(format!("cannot open {:?}: {}", path, e)));
            }
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut archive = Archive::new();
        let mut rows = 0usize;

        for result in reader.deserialize::<TrendingRecord>() {
            let record = result
                .map_err(|e| TrendError::Archive(format!("malformed archive {:?}: {}", path, e)))?;
            rows += 1;
            // First occurrence wins when the file itself holds duplicate keys
            archive.records.entry(key_of(&record)).or_insert(record);
        }

        tracing::info!("Loaded {} archive rows ({} unique) from {:?}", rows, archive.len(), path);
        Ok(ArchiveSource::Loaded(archive))
    }

    /// Load the archive, starting empty when the file does not exist
    pub fn load_or_empty(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::load(path)?.into_archive())
    }

    /// Add records, replacing any existing rows with the same key
    pub fn extend<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = TrendingRecord>,
    {
        let mut replaced = 0;
        for record in records {
            if self.records.insert(key_of(&record), record).is_some() {
                replaced += 1;
            }
        }
        replaced
    }

    /// Replace everything archived for one country-day with `records`.
    ///
    /// Rows of the previous run that the new run no longer produces are
    /// removed, so the archive always matches the last published list.
    /// Returns the number of rows removed.
    pub fn replace_day<I>(&mut self, country: &str, date: NaiveDate, records: I) -> usize
    where
        I: IntoIterator<Item = TrendingRecord>,
    {
        let before = self.records.len();
        self.records
            .retain(|(d, c, _), _| !(*d == date && c == country));
        let removed = before - self.records.len();
        self.extend(records);
        removed
    }

    /// Records ordered by `(date, country, rank)`
    pub fn records(&self) -> impl Iterator<Item = &TrendingRecord> {
        self.records.values()
    }

    /// Records for one country within `[start, end)`
    pub fn records_between<'a>(
        &'a self,
        country: &'a str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &'a TrendingRecord> + 'a {
        self.records
            .range((start, String::new(), 0)..(end, String::new(), 0))
            .map(|(_, record)| record)
            .filter(move |record| record.country == country)
    }

    /// Records published for one country-day, by rank
    pub fn day(&self, country: &str, date: NaiveDate) -> Vec<&TrendingRecord> {
        self.records()
            .filter(|r| r.date == date && r.country == country)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite the archive file, sorted by `(date, country, rank)`.
    ///
    /// Writes to a sibling temporary file first and renames it into place so
    /// a failed write never truncates the previous archive.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = temp_path(path);
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp_path)?;
            writer.write_record(ARCHIVE_COLUMNS)?;
            for record in self.records() {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;

        tracing::info!("Wrote {} archive rows to {:?}", self.len(), path);
        Ok(())
    }
}

impl FromIterator<TrendingRecord> for Archive {
    fn from_iter<T: IntoIterator<Item = TrendingRecord>>(iter: T) -> Self {
        let mut archive = Archive::new();
        archive.extend(iter);
        archive
    }
}

fn key_of(record: &TrendingRecord) -> Key {
    (record.date, record.country.clone(), record.rank)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
