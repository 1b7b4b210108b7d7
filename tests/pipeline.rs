use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;

use chrono::NaiveDate;
use tempfile::TempDir;

use trendwiki::{
    Archive, CandidateQuery, Config, Enrichment, PagePublisher, PublicationTarget, Result, RunDriver,
    SummaryLookup, TrendError, TrendingRecord, TrendingSource,
};

/// Engine that ranks a fixed list per country, honouring the exclusions the
/// way the real query does and recording what it was asked
struct FakeEngine {
    candidates: Vec<(&'static str, Vec<&'static str>)>,
    queries: RefCell<Vec<CandidateQuery>>,
    leak_blocklisted: bool,
}

impl FakeEngine {
    fn new(candidates: Vec<(&'static str, Vec<&'static str>)>) -> Self {
        Self {
            candidates,
            queries: RefCell::new(Vec::new()),
            leak_blocklisted: false,
        }
    }
}

fn tuple_members(tuple: &Option<String>) -> HashSet<String> {
    tuple
        .as_deref()
        .map(|t| {
            t.trim_matches(|c| c == '(' || c == ')')
                .split(", ")
                .map(|s| s.trim_matches('\'').to_string())
                .collect()
        })
        .unwrap_or_default()
}

impl TrendingSource for FakeEngine {
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<TrendingRecord>> {
        self.queries.borrow_mut().push(query.clone());
        let blocked = tuple_members(&query.blocklist);
        let recent = tuple_members(&query.recently_trending);

        let articles = self
            .candidates
            .iter()
            .find(|(country, _)| *country == query.country)
            .map(|(_, articles)| articles.clone())
            .unwrap_or_default();

        Ok(articles
            .into_iter()
            .filter(|a| self.leak_blocklisted || !blocked.contains(*a))
            .filter(|a| !recent.contains(*a))
            .enumerate()
            .map(|(i, a)| TrendingRecord::new(query.date, query.country.clone(), a, i as u32 + 1))
            .collect())
    }
}

struct FakeSummaries;

impl SummaryLookup for FakeSummaries {
    fn summarize(&self, article: &str) -> Result<Enrichment> {
        match article {
            "Wizkid" => Ok(Enrichment {
                title: "Wizkid".to_string(),
                description: Some("<p>Nigerian singer</p>".to_string()),
                image_url: Some("https://upload.example/wizkid.jpg".to_string()),
            }),
            "Unreachable" => Err(TrendError::Summary {
                article: article.to_string(),
                message: "timed out".to_string(),
            }),
            other => Ok(Enrichment {
                title: other.replace('_', " "),
                description: None,
                image_url: None,
            }),
        }
    }
}

#[derive(Default)]
struct FakeWiki {
    failing: HashSet<String>,
    edits: RefCell<Vec<(String, String, String)>>,
}

impl PagePublisher for FakeWiki {
    fn publish(&self, page_title: &str, content: &str, summary: &str) -> Result<()> {
        if self.failing.contains(page_title) {
            return Err(TrendError::Publish {
                page: page_title.to_string(),
                message: "missingtitle".to_string(),
            });
        }
        self.edits
            .borrow_mut()
            .push((page_title.to_string(), content.to_string(), summary.to_string()));
        Ok(())
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn rerunning_a_day_does_not_duplicate_archive_rows() {
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("trending_articles.csv");
    let config = Config::default()
        .with_archive_path(&archive_path)
        .with_lists(vec![
            PublicationTarget::new("NG", ["NG", "KE"]),
            PublicationTarget::new("IN", ["IN"]),
        ]);
    let engine = FakeEngine::new(vec![
        ("NG", vec!["Wizkid", "Lagos", "Unreachable"]),
        ("IN", vec!["Cricket"]),
    ]);
    let wiki = FakeWiki::default();
    let driver = RunDriver::new(&config, &engine, &FakeSummaries, &wiki);
    let date = day(2021, 3, 7);

    driver.run_and_persist(&archive_path, date).unwrap();
    let first = fs::read_to_string(&archive_path).unwrap();
    driver.run_and_persist(&archive_path, date).unwrap();
    let second = fs::read_to_string(&archive_path).unwrap();

    assert_eq!(first, second);
    let archive = Archive::load_or_empty(&archive_path).unwrap();
    assert_eq!(archive.len(), 4);

    let keys: HashSet<_> = archive.records().map(|r| (r.date, r.country.clone(), r.rank)).collect();
    assert_eq!(keys.len(), archive.len());

    // Rows are sorted by (date, country, rank)
    let countries: Vec<_> = archive.records().map(|r| r.country.as_str()).collect();
    assert_eq!(countries, vec!["IN", "NG", "NG", "NG"]);

    // The second run sees the first run's rows only as same-day rows, which
    // never count as recent
    assert!(engine.queries.borrow().iter().all(|q| q.recently_trending.is_none()));
}

#[test]
fn next_day_suppresses_prominent_articles() {
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("trending_articles.csv");
    let config = Config::default().with_lists(vec![PublicationTarget::new("NG", ["NG"])]);
    let engine = FakeEngine::new(vec![("NG", vec!["Wizkid", "Lagos", "Abuja"])]);
    let wiki = FakeWiki::default();
    let driver = RunDriver::new(&config, &engine, &FakeSummaries, &wiki);

    driver.run_and_persist(&archive_path, day(2021, 3, 7)).unwrap();
    driver.run_and_persist(&archive_path, day(2021, 3, 8)).unwrap();

    let queries = engine.queries.borrow();
    assert_eq!(
        queries[1].recently_trending.as_deref(),
        Some("('Abuja', 'Lagos', 'Wizkid')")
    );

    let archive = Archive::load_or_empty(&archive_path).unwrap();
    assert!(archive.day("NG", day(2021, 3, 8)).is_empty());
    assert_eq!(wiki.edits.borrow()[1].1, "[]");
}

#[test]
fn published_payload_shape_and_fanout_isolation() {
    let config = Config::default().with_lists(vec![PublicationTarget::new("NG", ["NG", "KE", "PT"])]);
    let engine = FakeEngine::new(vec![("NG", vec!["Wizkid", "Unreachable", "Burna_Boy"])]);
    let wiki = FakeWiki {
        failing: [config.page_title("KE")].into_iter().collect(),
        ..Default::default()
    };
    let driver = RunDriver::new(&config, &engine, &FakeSummaries, &wiki);

    let mut archive = Archive::new();
    let report = driver.run(&mut archive, day(2021, 3, 7));

    let edits = wiki.edits.borrow();
    let pages: Vec<_> = edits.iter().map(|(page, _, _)| page.clone()).collect();
    assert_eq!(pages, vec![config.page_title("NG"), config.page_title("PT")]);
    assert_eq!(edits[0].1, edits[1].1);
    assert_eq!(
        edits[0].1,
        concat!(
            r#"[{"title":"Wizkid","description":"<p>Nigerian singer</p>","imageUrl":"https://upload.example/wizkid.jpg"},"#,
            r#"{"title":"Unreachable"},"#,
            r#"{"title":"Burna Boy"}]"#
        )
    );
    assert_eq!(edits[0].2, "Update with trending articles from 2021-03-07");

    assert!(report.has_failures());
    assert_eq!(report.failed_countries().count(), 0);
    assert_eq!(report.failed_pages().count(), 1);
    assert_eq!(archive.len(), 3);
}

#[test]
fn blocklisted_article_is_never_published() {
    let config = Config::default()
        .with_lists(vec![PublicationTarget::new("UG", ["UG"])])
        .with_blocklist(["Main_Page"]);
    let engine = FakeEngine::new(vec![("UG", vec!["Main_Page", "Kampala"])]);
    let wiki = FakeWiki::default();
    let driver = RunDriver::new(&config, &engine, &FakeSummaries, &wiki);

    let mut archive = Archive::new();
    let report = driver.run(&mut archive, day(2021, 3, 7));

    assert!(!report.has_failures());
    assert_eq!(engine.queries.borrow()[0].blocklist.as_deref(), Some("('Main_Page')"));
    assert_eq!(wiki.edits.borrow()[0].1, r#"[{"title":"Kampala"}]"#);
    assert_eq!(archive.day("UG", day(2021, 3, 7))[0].rank, 1);
}

#[test]
fn engine_leaking_a_blocklisted_article_publishes_nothing() {
    let config = Config::default()
        .with_lists(vec![PublicationTarget::new("UG", ["UG"])])
        .with_blocklist(["Main_Page"]);
    let mut engine = FakeEngine::new(vec![("UG", vec!["Main_Page", "Kampala"])]);
    engine.leak_blocklisted = true;
    let wiki = FakeWiki::default();
    let driver = RunDriver::new(&config, &engine, &FakeSummaries, &wiki);

    let mut archive = Archive::new();
    let report = driver.run(&mut archive, day(2021, 3, 7));

    assert_eq!(report.failed_countries().count(), 1);
    assert!(wiki.edits.borrow().is_empty());
    assert!(archive.is_empty());
}

#[test]
fn rerun_with_fewer_rows_leaves_no_stale_archive_rows() {
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("trending_articles.csv");
    let lists = vec![PublicationTarget::new("NG", ["NG"])];
    let date = day(2021, 3, 7);
    let engine = FakeEngine::new(vec![("NG", vec!["A", "Bad", "C"])]);
    let wiki = FakeWiki::default();

    let first = Config::default().with_lists(lists.clone()).with_blocklist(Vec::<String>::new());
    RunDriver::new(&first, &engine, &FakeSummaries, &wiki)
        .run_and_persist(&archive_path, date)
        .unwrap();

    // Rerun after "Bad" was added to the blocklist
    let second = Config::default().with_lists(lists).with_blocklist(["Bad"]);
    RunDriver::new(&second, &engine, &FakeSummaries, &wiki)
        .run_and_persist(&archive_path, date)
        .unwrap();

    let archive = Archive::load_or_empty(&archive_path).unwrap();
    let rows: Vec<_> = archive
        .day("NG", date)
        .into_iter()
        .map(|r| (r.rank, r.article.clone()))
        .collect();
    assert_eq!(rows, vec![(1, "A".to_string()), (2, "C".to_string())]);
    assert_eq!(wiki.edits.borrow()[1].1, r#"[{"title":"A"},{"title":"C"}]"#);
}
