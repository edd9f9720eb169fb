//! Trailing-window form features per team.
//!
//! The dataset is partitioned by team, each partition is sorted by date and
//! transformed on its own, then the partitions are concatenated and re-sorted
//! by date. The window is closed on the left: a match never contributes to
//! its own features.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::aggregate::CanonicalDataset;
use crate::model::{MatchRecord, MatchResult, Stat};
use crate::team_names::TeamNames;

pub const WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RollingFeatureRow {
    pub record: MatchRecord,
    /// Mean of each stat over the previous `WINDOW` matches, indexed by [`Stat::index`].
    pub rolling: [f64; Stat::COUNT],
    /// Points from the previous `WINDOW` matches (W=3, D=1, L=0).
    pub form: u32,
    pub venue_code: u32,
    pub team_code: u32,
    pub hour: Option<u32>,
    /// Monday = 0.
    pub day_code: u32,
    /// 1 for a win, -1 otherwise.
    pub target: i8,
}

impl RollingFeatureRow {
    pub fn rolling(&self, stat: Stat) -> f64 {
        self.rolling[stat.index()]
    }
}

/// Category codes: position of a value among the sorted distinct values.
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoding {
    venues: Vec<String>,
    teams: Vec<String>,
}

impl FeatureEncoding {
    pub fn fit(records: &[MatchRecord]) -> Self {
        let mut venues: Vec<String> = records.iter().map(|r| r.venue.clone()).collect();
        venues.sort();
        venues.dedup();
        let mut teams: Vec<String> = records.iter().map(|r| r.team.clone()).collect();
        teams.sort();
        teams.dedup();
        Self { venues, teams }
    }

    pub fn venue_code(&self, venue: &str) -> Option<u32> {
        code_of(&self.venues, venue)
    }

    pub fn team_code(&self, team: &str) -> Option<u32> {
        code_of(&self.teams, team)
    }
}

fn code_of(categories: &[String], value: &str) -> Option<u32> {
    categories
        .binary_search_by(|c| c.as_str().cmp(value))
        .ok()
        .and_then(|idx| u32::try_from(idx).ok())
}

/// Copy of the dataset with team and opponent names run through `names`.
pub fn canonicalize_names(dataset: &CanonicalDataset, names: &TeamNames) -> CanonicalDataset {
    let records = dataset
        .records
        .iter()
        .map(|rec| MatchRecord {
            team: names.canonical(&rec.team).to_string(),
            opponent: names.canonical(&rec.opponent).to_string(),
            ..rec.clone()
        })
        .collect();
    CanonicalDataset::from_records(records)
}

pub fn build_rolling_features(dataset: &CanonicalDataset) -> Vec<RollingFeatureRow> {
    let encoding = FeatureEncoding::fit(&dataset.records);

    let mut partitions: BTreeMap<&str, Vec<&MatchRecord>> = BTreeMap::new();
    for rec in &dataset.records {
        partitions.entry(rec.team.as_str()).or_default().push(rec);
    }

    let mut out: Vec<RollingFeatureRow> = partitions
        .into_values()
        .flat_map(|group| rolling_for_team(group, &encoding))
        .collect();
    // Stable: same-day rows keep team order from the partition map.
    out.sort_by_key(|row| row.record.date);
    out
}

fn rolling_for_team(
    mut group: Vec<&MatchRecord>,
    encoding: &FeatureEncoding,
) -> Vec<RollingFeatureRow> {
    group.sort_by_key(|rec| rec.date);

    let mut out = Vec::with_capacity(group.len().saturating_sub(WINDOW));
    for idx in WINDOW..group.len() {
        let window = &group[idx - WINDOW..idx];
        let Some(rolling) = window_means(window) else {
            continue;
        };
        let rec = group[idx];
        out.push(RollingFeatureRow {
            record: rec.clone(),
            rolling,
            form: window.iter().map(|r| r.result.points()).sum(),
            venue_code: encoding.venue_code(&rec.venue).unwrap_or_default(),
            team_code: encoding.team_code(&rec.team).unwrap_or_default(),
            hour: rec.hour(),
            day_code: rec.date.weekday().num_days_from_monday(),
            target: if rec.result == MatchResult::Win { 1 } else { -1 },
        });
    }
    out
}

// None when any stat is blank somewhere in the window.
fn window_means(window: &[&MatchRecord]) -> Option<[f64; Stat::COUNT]> {
    let mut means = [0.0; Stat::COUNT];
    for stat in Stat::ALL {
        let mut sum = 0.0;
        for rec in window {
            sum += rec.stat(stat)?;
        }
        means[stat.index()] = sum / window.len() as f64;
    }
    Some(means)
}
