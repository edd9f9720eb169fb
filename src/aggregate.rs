use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::PipelineError;
use crate::model::MatchRecord;

/// All checkpointed match records, ordered by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalDataset {
    pub records: Vec<MatchRecord>,
}

impl CanonicalDataset {
    /// Sorts by date; same-day rows are ordered by team so reloads compare equal.
    pub fn from_records(mut records: Vec<MatchRecord>) -> Self {
        records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.team.cmp(&b.team)));
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    pub artifacts: usize,
    pub rows: usize,
    pub skipped_rows: usize,
    pub errors: Vec<String>,
}

/// Lower-cases every field name. On a case-only clash the first name in sort order wins.
pub fn normalize_fields(row: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in row {
        out.entry(key.to_lowercase())
            .or_insert_with(|| value.clone());
    }
    out
}

pub fn aggregate(store: &CheckpointStore) -> Result<(CanonicalDataset, AggregateReport)> {
    let paths = store.artifact_paths()?;
    if paths.is_empty() {
        return Err(PipelineError::NoArtifacts(store.dir().to_path_buf()).into());
    }

    let mut report = AggregateReport::default();
    let mut records = Vec::new();
    for path in &paths {
        let artifact = match store.read_artifact(path) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "unreadable artifact");
                report.errors.push(format!("{err:#}"));
                continue;
            }
        };
        report.artifacts += 1;
        for row in &artifact.rows {
            match MatchRecord::from_fields(&normalize_fields(row)) {
                Ok(record) => records.push(record),
                Err(err) => {
                    debug!(key = %artifact.key(), error = %err, "dropping row");
                    report.skipped_rows += 1;
                }
            }
        }
    }
    if report.artifacts == 0 {
        return Err(PipelineError::NoArtifacts(store.dir().to_path_buf()).into());
    }

    let dataset = CanonicalDataset::from_records(records);
    report.rows = dataset.len();
    info!(
        artifacts = report.artifacts,
        rows = report.rows,
        skipped = report.skipped_rows,
        "aggregated checkpoints"
    );
    Ok((dataset, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::TeamSeasonArtifact;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn source_row(date: &str, team: &str, opponent: &str) -> BTreeMap<String, String> {
        row(&[
            ("Date", date),
            ("Venue", "Home"),
            ("Result", "W"),
            ("Team", team),
            ("Opponent", opponent),
            ("Comp", "Premier League"),
            ("Season", "2024"),
            ("GF", "2"),
            ("xG", "1.4"),
            ("PKatt", "0"),
        ])
    }

    #[test]
    fn field_names_are_lower_cased() {
        let out = normalize_fields(&row(&[("xG", "1.2"), ("PKatt", "1"), ("Date", "d")]));
        assert_eq!(out["xg"], "1.2");
        assert_eq!(out["pkatt"], "1");
        assert_eq!(out["date"], "d");
    }

    #[test]
    fn empty_store_fails_loudly() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(tmp.path()).unwrap();
        let err = aggregate(&store).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoArtifacts(_))
        ));
    }

    #[test]
    fn artifacts_concatenate_in_date_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(tmp.path()).unwrap();
        store
            .write(&TeamSeasonArtifact {
                team: "Arsenal".to_string(),
                season: 2024,
                rows: vec![
                    source_row("2023-08-20", "Arsenal", "Fulham"),
                    source_row("2023-08-12", "Arsenal", "Forest"),
                ],
            })
            .unwrap();
        store
            .write(&TeamSeasonArtifact {
                team: "Burnley".to_string(),
                season: 2024,
                rows: vec![
                    source_row("2023-08-11", "Burnley", "Man City"),
                    row(&[("Date", "not a date")]),
                ],
            })
            .unwrap();

        let (dataset, report) = aggregate(&store).unwrap();
        assert_eq!(report.artifacts, 2);
        assert_eq!(report.skipped_rows, 1);
        let teams: Vec<&str> = dataset.records.iter().map(|r| r.team.as_str()).collect();
        assert_eq!(teams, vec!["Burnley", "Arsenal", "Arsenal"]);
        assert_eq!(dataset.records[0].date.to_string(), "2023-08-11");
    }
}
