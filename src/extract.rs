use std::collections::{BTreeMap, HashSet};
use std::fmt;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::config::SITE_ROOT;
use crate::error::PipelineError;

static TABLE: Lazy<Selector> = Lazy::new(|| selector("table"));
static CAPTION: Lazy<Selector> = Lazy::new(|| selector("caption"));
static HEAD_ROW: Lazy<Selector> = Lazy::new(|| selector("thead tr"));
static BODY_ROW: Lazy<Selector> = Lazy::new(|| selector("tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("th, td"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// Header row plus body rows, all cells as trimmed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Rows keyed by header. A repeated header keeps its first cell.
    pub fn records(&self) -> Vec<BTreeMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                let mut rec = BTreeMap::new();
                for (header, cell) in self.headers.iter().zip(row) {
                    rec.entry(header.clone()).or_insert_with(|| cell.clone());
                }
                rec
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableQuery {
    /// The `index`-th table matching a CSS selector.
    Css { selector: String, index: usize },
    /// The first table whose caption contains the text.
    Caption(String),
}

impl TableQuery {
    pub fn css(selector: &str, index: usize) -> Self {
        Self::Css {
            selector: selector.to_string(),
            index,
        }
    }

    pub fn caption(text: &str) -> Self {
        Self::Caption(text.to_string())
    }
}

impl fmt::Display for TableQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableQuery::Css { selector, index } => write!(f, "`{selector}`[{index}]"),
            TableQuery::Caption(text) => write!(f, "caption \"{text}\""),
        }
    }
}

pub trait PageExtractor {
    fn extract_table(&self, page: &str, query: &TableQuery) -> Result<Table, PipelineError>;

    /// Absolute URLs of anchors under `scope` whose href contains `pattern`, first occurrence order.
    fn extract_links(&self, page: &str, scope: &str, pattern: &str) -> Vec<String>;

    /// Like [`PageExtractor::extract_links`], restricted to the one table `query` finds.
    fn extract_table_links(
        &self,
        page: &str,
        query: &TableQuery,
        pattern: &str,
    ) -> Result<Vec<String>, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    base: Url,
}

impl HtmlExtractor {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid base url {base}"))?;
        Ok(Self { base })
    }

    pub fn for_site() -> Result<Self> {
        Self::new(SITE_ROOT)
    }

    fn absolute(&self, href: &str) -> Option<String> {
        self.base.join(href).ok().map(String::from)
    }

    fn collect_links<'a>(
        &self,
        anchors: impl Iterator<Item = ElementRef<'a>>,
        pattern: &str,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for anchor in anchors {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.contains(pattern) {
                continue;
            }
            let Some(url) = self.absolute(href) else {
                continue;
            };
            if seen.insert(url.clone()) {
                out.push(url);
            }
        }
        out
    }
}

impl PageExtractor for HtmlExtractor {
    fn extract_table(&self, page: &str, query: &TableQuery) -> Result<Table, PipelineError> {
        let doc = Html::parse_document(page);
        let table = find_table(&doc, query)?;
        Ok(read_table(table))
    }

    fn extract_links(&self, page: &str, scope: &str, pattern: &str) -> Vec<String> {
        let Ok(sel) = Selector::parse(scope) else {
            warn!(scope, "invalid link scope selector");
            return Vec::new();
        };
        let doc = Html::parse_document(page);
        self.collect_links(doc.select(&sel), pattern)
    }

    fn extract_table_links(
        &self,
        page: &str,
        query: &TableQuery,
        pattern: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let doc = Html::parse_document(page);
        let table = find_table(&doc, query)?;
        Ok(self.collect_links(table.select(&ANCHOR), pattern))
    }
}

fn find_table<'a>(doc: &'a Html, query: &TableQuery) -> Result<ElementRef<'a>, PipelineError> {
    let found = match query {
        TableQuery::Css { selector, index } => {
            let sel = Selector::parse(selector)
                .map_err(|_| PipelineError::MissingTable(query.to_string()))?;
            doc.select(&sel).nth(*index)
        }
        TableQuery::Caption(text) => doc.select(&TABLE).find(|table| {
            table
                .select(&CAPTION)
                .next()
                .is_some_and(|cap| cell_text(cap).contains(text.as_str()))
        }),
    };
    found.ok_or_else(|| PipelineError::MissingTable(query.to_string()))
}

fn read_table(table: ElementRef<'_>) -> Table {
    let mut body: Vec<Vec<String>> = table
        .select(&BODY_ROW)
        .filter(|row| !is_decoration_row(*row))
        .map(row_cells)
        .collect();
    let headers = match table.select(&HEAD_ROW).last() {
        Some(row) => row_cells(row),
        None if !body.is_empty() => body.remove(0),
        None => Vec::new(),
    };
    body.retain(|row| row.len() == headers.len());
    Table {
        headers,
        rows: body,
    }
}

// Repeated header and spacer rows inside long match logs.
fn is_decoration_row(row: ElementRef<'_>) -> bool {
    row.value()
        .classes()
        .any(|c| matches!(c, "thead" | "spacer" | "over_header"))
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.select(&CELL).map(cell_text).collect()
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="stats_table" id="first">
          <caption>Scores &amp; Fixtures 2023-2024</caption>
          <thead>
            <tr><th colspan="2">Group</th></tr>
            <tr><th>Date</th><th>GF</th></tr>
          </thead>
          <tbody>
            <tr><th>2023-08-12</th><td>2</td></tr>
            <tr class="thead"><th>Date</th><th>GF</th></tr>
            <tr><th>2023-08-19</th><td>1</td></tr>
          </tbody>
        </table>
        <table class="stats_table"><tbody><tr><td>A</td></tr><tr><td>x</td></tr></tbody></table>
        <a href="/en/squads/abc/Arsenal-Stats">Arsenal</a>
        <a href="/en/squads/abc/Arsenal-Stats">Arsenal again</a>
        <a class="prev" href="/en/comps/9/2022-2023/2022-2023-Premier-League-Stats">Prev</a>
        </body></html>
    "#;

    #[test]
    fn caption_query_uses_last_header_row_and_skips_repeats() {
        let ex = HtmlExtractor::for_site().unwrap();
        let table = ex
            .extract_table(PAGE, &TableQuery::caption("Scores & Fixtures"))
            .unwrap();
        assert_eq!(table.headers, vec!["Date", "GF"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["2023-08-19", "1"]);
        assert_eq!(table.records()[0]["GF"], "2");
    }

    #[test]
    fn css_query_without_thead_promotes_first_row() {
        let ex = HtmlExtractor::for_site().unwrap();
        let table = ex
            .extract_table(PAGE, &TableQuery::css("table.stats_table", 1))
            .unwrap();
        assert_eq!(table.headers, vec!["A"]);
        assert_eq!(table.rows, vec![vec!["x".to_string()]]);
    }

    #[test]
    fn missing_table_is_reported() {
        let ex = HtmlExtractor::for_site().unwrap();
        let err = ex
            .extract_table(PAGE, &TableQuery::caption("Shooting"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingTable(_)));
    }

    #[test]
    fn links_are_absolute_filtered_and_deduped() {
        let ex = HtmlExtractor::for_site().unwrap();
        let squads = ex.extract_links(PAGE, "a", "/squads/");
        assert_eq!(squads, vec!["https://fbref.com/en/squads/abc/Arsenal-Stats"]);
        let prev = ex.extract_links(PAGE, "a.prev", "");
        assert_eq!(prev.len(), 1);
        assert!(prev[0].ends_with("2022-2023-Premier-League-Stats"));
    }

    #[test]
    fn table_links_stay_inside_the_selected_table() {
        let page = r#"
            <table class="stats_table">
              <tr><td><a href="/en/squads/a1/Arsenal-Stats">Arsenal</a></td></tr>
              <tr><td><a href="/en/players/p1/Someone">Player</a></td></tr>
            </table>
            <table class="stats_table">
              <tr><td><a href="/en/squads/c1/Chelsea-Stats">Chelsea</a></td></tr>
            </table>
        "#;
        let ex = HtmlExtractor::for_site().unwrap();
        let links = ex
            .extract_table_links(page, &TableQuery::css("table.stats_table", 0), "/squads/")
            .unwrap();
        assert_eq!(links, vec!["https://fbref.com/en/squads/a1/Arsenal-Stats"]);

        let err = ex
            .extract_table_links(page, &TableQuery::css("table.stats_table", 2), "/squads/")
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingTable(_)));
    }
}
