//! Article sets and their SQL `IN` serialization

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Render an iterable of strings as a SQL tuple for an `IN` / `NOT IN` clause.
///
/// Returns `None` for an empty input: `IN ()` is a syntax error in most
/// engines, and callers should drop the clause instead. A single element is
/// rendered as `('x')`, without the trailing comma a tuple literal would carry.
pub fn sql_tuple<I, S>(items: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = items
        .into_iter()
        .map(|item| sql_string_literal(item.as_ref()))
        .collect();

    if quoted.is_empty() {
        return None;
    }

    Some(format!("({})", quoted.join(", ")))
}

/// Quote a value as a single-quoted SQL string literal
pub fn sql_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// An ordered, deduplicated set of article identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleSet(BTreeSet<String>);

impl ArticleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, article: &str) -> bool {
        self.0.contains(article)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// SQL tuple of the members, `None` when empty
    pub fn sql_tuple(&self) -> Option<String> {
        sql_tuple(self.iter())
    }
}

impl<S: Into<String>> FromIterator<S> for ArticleSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Permanently banned article identifiers, applied to every query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blocklist {
    articles: ArticleSet,
}

impl Blocklist {
    pub fn new<I, S>(articles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            articles: articles.into_iter().collect(),
        }
    }

    pub fn is_blocked(&self, article: &str) -> bool {
        self.articles.contains(article)
    }

    /// Serialized `NOT IN` set, `None` meaning "no filter"
    pub fn sql_tuple(&self) -> Option<String> {
        self.articles.sql_tuple()
    }
}
