//! Season/team traversal of the standings pages.
//!
//! Seasons are followed through each standings page's "previous season"
//! link; season identifiers in the site's URLs are not predictable.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointStore, SeasonIndex, TeamLink, TeamSeasonArtifact, artifact_key};
use crate::config::CrawlConfig;
use crate::error::PipelineError;
use crate::extract::{PageExtractor, Table, TableQuery};
use crate::fetch::{Backoff, PageFetcher};
use crate::team_names::team_name_from_url;

const STANDINGS_TABLE: &str = "table.stats_table";
const PREVIOUS_SEASON_SCOPE: &str = "a.prev";
const MATCH_LOG_CAPTION: &str = "Scores & Fixtures";
const SHOOTING_CAPTION: &str = "Shooting";
const JOIN_COLUMN: &str = "Date";
const COMP_COLUMN: &str = "Comp";
const SHOOTING_COLUMNS: &[&str] = &["Sh", "SoT", "Dist", "FK", "PK", "PKatt"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub seasons_visited: usize,
    pub teams_fetched: usize,
    /// Team-seasons that already had an artifact.
    pub teams_skipped: usize,
    pub rows_written: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeamOutcome {
    AlreadyCheckpointed,
    Written { rows: usize },
}

impl CrawlSummary {
    fn record(mut self, season: i32, team: &str, outcome: Result<TeamOutcome>) -> Self {
        match outcome {
            Ok(TeamOutcome::AlreadyCheckpointed) => self.teams_skipped += 1,
            Ok(TeamOutcome::Written { rows }) => {
                self.teams_fetched += 1;
                self.rows_written += rows;
            }
            Err(err) => {
                warn!(team, season, error = %format!("{err:#}"), "skipping team-season");
                self.errors.push(format!("{team} {season}: {err:#}"));
            }
        }
        self
    }
}

pub struct CrawlController<F, E> {
    fetcher: F,
    extractor: E,
    store: CheckpointStore,
    config: CrawlConfig,
    backoff: Backoff,
}

impl<F: PageFetcher, E: PageExtractor> CrawlController<F, E> {
    pub fn new(
        fetcher: F,
        extractor: E,
        store: CheckpointStore,
        config: CrawlConfig,
        backoff: Backoff,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            config,
            backoff,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn run(&mut self) -> CrawlSummary {
        let mut summary = CrawlSummary::default();
        let mut next_url = Some(self.config.start_url.clone());
        let seasons = self.config.seasons.clone();

        for season in seasons {
            let Some(url) = next_url.take() else {
                warn!(season, "no standings url left, stopping traversal");
                summary
                    .errors
                    .push(format!("season {season}: previous-season link not found"));
                break;
            };
            let index = match self.season_index(season, &url) {
                Ok(index) => index,
                Err(err) => {
                    warn!(season, url = %url, error = %format!("{err:#}"), "standings unavailable");
                    summary.errors.push(format!("season {season}: {err:#}"));
                    break;
                }
            };
            summary.seasons_visited += 1;
            next_url = index.previous_url.clone();
            if index.teams.is_empty() {
                let err = PipelineError::MissingLink(self.config.squad_link_pattern.clone());
                warn!(season, url = %url, error = %err, "standings list no teams");
                summary.errors.push(format!("season {season}: {err}"));
                continue;
            }
            info!(season, teams = index.teams.len(), "crawling season");

            for team in &index.teams {
                let outcome = self.crawl_team(team, season);
                summary = summary.record(season, &team.name, outcome);
            }
        }

        info!(
            seasons = summary.seasons_visited,
            fetched = summary.teams_fetched,
            skipped = summary.teams_skipped,
            errors = summary.errors.len(),
            "crawl finished"
        );
        summary
    }

    fn season_index(&mut self, season: i32, url: &str) -> Result<SeasonIndex> {
        if let Some(index) = self.store.season_index(season, url) {
            debug!(season, "standings taken from checkpoint");
            return Ok(index);
        }

        let page = self.fetcher.fetch(url, &mut self.backoff)?;
        let previous_url = self
            .extractor
            .extract_links(&page, PREVIOUS_SEASON_SCOPE, "")
            .into_iter()
            .next();
        if previous_url.is_none() {
            warn!(season, "standings page has no previous-season link");
        }

        let teams: Vec<TeamLink> = self
            .extractor
            .extract_table_links(
                &page,
                &TableQuery::css(STANDINGS_TABLE, 0),
                &self.config.squad_link_pattern,
            )
            .unwrap_or_else(|err| {
                warn!(season, error = %err, "standings table missing");
                Vec::new()
            })
            .into_iter()
            .filter_map(|url| {
                let name = team_name_from_url(&url)?;
                Some(TeamLink { name, url })
            })
            .collect();

        let index = SeasonIndex {
            season,
            standings_url: url.to_string(),
            teams,
            previous_url,
        };
        // An empty listing is not cached so the next run asks again.
        if !index.teams.is_empty() {
            self.store.write_season_index(&index)?;
        }
        Ok(index)
    }

    fn crawl_team(&mut self, team: &TeamLink, season: i32) -> Result<TeamOutcome> {
        let key = artifact_key(&team.name, season);
        if self.store.contains(&key) {
            debug!(key = %key, "checkpoint present");
            return Ok(TeamOutcome::AlreadyCheckpointed);
        }

        let log_page = self.fetcher.fetch(&team.url, &mut self.backoff)?;
        let matches = self
            .extractor
            .extract_table(&log_page, &TableQuery::caption(MATCH_LOG_CAPTION))?;

        let pattern = &self.config.shooting_link_pattern;
        let shooting_url = self
            .extractor
            .extract_links(&log_page, "a", pattern)
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::MissingLink(pattern.clone()))?;
        let shooting_page = self.fetcher.fetch(&shooting_url, &mut self.backoff)?;
        let shooting = self
            .extractor
            .extract_table(&shooting_page, &TableQuery::caption(SHOOTING_CAPTION))?;

        let joined = join_on_date(&matches, &shooting);
        if joined.is_empty() {
            return Err(PipelineError::EmptyJoin.into());
        }
        let rows = tag_rows(
            filter_competition(joined, &self.config.competition),
            &team.name,
            season,
        );

        let artifact = TeamSeasonArtifact {
            team: team.name.clone(),
            season,
            rows,
        };
        let count = artifact.rows.len();
        self.store.write(&artifact)?;
        info!(team = %team.name, season, rows = count, "team-season checkpointed");
        Ok(TeamOutcome::Written { rows: count })
    }
}

/// Inner join of match-log rows with the shooting columns of rows on the same date.
pub fn join_on_date(matches: &Table, shooting: &Table) -> Vec<BTreeMap<String, String>> {
    let shooting_rows = shooting.records();
    let mut out = Vec::new();
    for row in matches.records() {
        let Some(date) = row.get(JOIN_COLUMN) else {
            continue;
        };
        for shot in shooting_rows
            .iter()
            .filter(|s| s.get(JOIN_COLUMN) == Some(date))
        {
            let mut merged = row.clone();
            for col in SHOOTING_COLUMNS {
                if let Some(value) = shot.get(*col) {
                    merged.insert((*col).to_string(), value.clone());
                }
            }
            out.push(merged);
        }
    }
    out
}

pub fn filter_competition(
    rows: Vec<BTreeMap<String, String>>,
    competition: &str,
) -> Vec<BTreeMap<String, String>> {
    rows.into_iter()
        .filter(|row| row.get(COMP_COLUMN).is_some_and(|c| c == competition))
        .collect()
}

fn tag_rows(
    rows: Vec<BTreeMap<String, String>>,
    team: &str,
    season: i32,
) -> Vec<BTreeMap<String, String>> {
    rows.into_iter()
        .map(|mut row| {
            row.insert("Season".to_string(), season.to_string());
            row.insert("Team".to_string(), team.to_string());
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn join_keeps_only_shared_dates_and_shooting_columns() {
        let matches = table(
            &["Date", "Comp", "GF"],
            &[
                &["2023-08-12", "Premier League", "2"],
                &["2023-08-15", "EFL Cup", "1"],
            ],
        );
        let shooting = table(
            &["Date", "Gls", "Sh", "SoT"],
            &[&["2023-08-12", "2", "14", "6"], &["2023-09-01", "0", "3", "1"]],
        );
        let joined = join_on_date(&matches, &shooting);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0]["Sh"], "14");
        assert_eq!(joined[0]["GF"], "2");
        assert!(!joined[0].contains_key("Gls"));
    }

    #[test]
    fn join_with_disjoint_dates_is_empty() {
        let matches = table(&["Date"], &[&["2023-08-12"]]);
        let shooting = table(&["Date", "Sh"], &[&["2022-01-01", "3"]]);
        assert!(join_on_date(&matches, &shooting).is_empty());
    }

    #[test]
    fn filter_and_tag() {
        let matches = table(
            &["Date", "Comp"],
            &[&["2023-08-12", "Premier League"], &["2023-08-15", "FA Cup"]],
        );
        let rows = tag_rows(
            filter_competition(matches.records(), "Premier League"),
            "Arsenal",
            2024,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Team"], "Arsenal");
        assert_eq!(rows[0]["Season"], "2024");
    }
}
