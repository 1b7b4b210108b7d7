//! Trending query: the request handed to the analytics engine and a
//! command-line engine that runs it

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate};

use crate::error::{Result, TrendError};
use crate::record::TrendingRecord;

/// Column the recency clause filters on
const TITLE_COLUMN: &str = "canonical_title";

/// How long one country's query may run unless configured otherwise
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3600);

/// How often a running query is checked for completion
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything the engine needs to rank one country-day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub country: String,
    pub date: NaiveDate,
    /// Serialized blocklist tuple, `None` when the blocklist is empty
    pub blocklist: Option<String>,
    /// Serialized recency exclusions, `None` when nothing is excluded
    pub recently_trending: Option<String>,
}

impl CandidateQuery {
    /// `AND canonical_title NOT IN (...)`, or an empty string when there is
    /// nothing to exclude
    pub fn not_recently_trending_clause(&self) -> String {
        match &self.recently_trending {
            Some(tuple) => format!("AND {} NOT IN {}", TITLE_COLUMN, tuple),
            None => String::new(),
        }
    }
}

/// Source of ranked trending candidates
pub trait TrendingSource {
    /// Ranked rows for one country-day, excluding blocklisted and recently
    /// trending articles
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<TrendingRecord>>;
}

/// SQL text with `{placeholder}` slots
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    text: String,
}

impl QueryTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Load the template from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TrendError::Config(format!("cannot read query file {:?}: {}", path, e)))?;
        Ok(Self::new(text))
    }

    /// Fill in the placeholders.
    ///
    /// Templates always carry `NOT IN {bad_recommendations}`, so an empty
    /// blocklist renders as `('')`, a set no real title belongs to.
    pub fn render(&self, query: &CandidateQuery) -> String {
        let bad_recommendations = query
            .blocklist
            .clone()
            .unwrap_or_else(|| "('')".to_string());

        self.text
            .replace("{country}", &query.country)
            .replace("{year}", &query.date.year().to_string())
            .replace("{month}", &query.date.month().to_string())
            .replace("{day}", &query.date.day().to_string())
            .replace("{bad_recommendations}", &bad_recommendations)
            .replace("{not_recently_trending_clause}", &query.not_recently_trending_clause())
    }
}

/// Runs the rendered query through an external command.
///
/// The query text is written to the command's stdin; the command must print
/// CSV with a `date,country,article,rank` header on stdout. A command still
/// running after the timeout is killed and the country fails.
#[derive(Debug, Clone)]
pub struct CommandQueryEngine {
    template: QueryTemplate,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandQueryEngine {
    pub fn new(template: QueryTemplate, command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| TrendError::Config("query command is empty".into()))?;
        Ok(Self {
            template,
            program: program.clone(),
            args: args.to_vec(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        })
    }

    /// Set how long one query may run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: thread::JoinHandle<std::io::Result<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    match reader.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(TrendError::Query(format!("failed to read query {}: {}", name, e))),
        Err(_) => Err(TrendError::Query(format!("query {} reader panicked", name))),
    }
}

impl TrendingSource for CommandQueryEngine {
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<TrendingRecord>> {
        let sql = self.template.render(query);
        tracing::debug!("Running {} for {} on {}", self.program, query.country, query.date);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TrendError::Query(format!("failed to start {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrendError::Query("query command stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TrendError::Query("query command stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TrendError::Query("query command stderr unavailable".into()))?;

        let writer = thread::spawn(move || stdin.write_all(sql.as_bytes()));
        let stdout = drain(stdout);
        let stderr = drain(stderr);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    // Reader threads are left behind: a grandchild may still
                    // hold the pipes open.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TrendError::Query(format!(
                        "{} timed out after {}s for {} on {}",
                        self.program,
                        self.timeout.as_secs_f64(),
                        query.country,
                        query.date
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(TrendError::Query(format!("{} did not complete: {}", self.program, e)));
                }
            }
        };

        let sent = writer.join();
        let stdout = collect(stdout, "stdout")?;
        let stderr = collect(stderr, "stderr")?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(TrendError::Query(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(TrendError::Query(format!("failed to send query: {}", e))),
            Err(_) => return Err(TrendError::Query("query writer thread panicked".into())),
        }

        parse_rows(&stdout)
    }
}

/// Parse engine CSV output into records
pub fn parse_rows(csv_bytes: &[u8]) -> Result<Vec<TrendingRecord>> {
    let mut reader = csv::Reader::from_reader(csv_bytes);
    reader
        .deserialize::<TrendingRecord>()
        .map(|row| row.map_err(|e| TrendError::Query(format!("malformed result row: {}", e))))
        .collect()
}
