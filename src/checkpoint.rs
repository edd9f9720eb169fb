//! On-disk checkpoints for the crawl.
//!
//! One JSON file per (team, season). A file's existence is the only signal
//! that the unit is done; contents are never re-validated or rewritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const SEASON_DIR: &str = "seasons";

/// Joined, filtered and tagged match-log rows for one team-season, with source field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonArtifact {
    pub team: String,
    pub season: i32,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl TeamSeasonArtifact {
    pub fn key(&self) -> String {
        artifact_key(&self.team, self.season)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLink {
    pub name: String,
    pub url: String,
}

/// Navigation state of one standings page, cached so a finished season needs no request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonIndex {
    pub season: i32,
    pub standings_url: String,
    pub teams: Vec<TeamLink>,
    pub previous_url: Option<String>,
}

pub fn artifact_key(team: &str, season: i32) -> String {
    format!("{team}-{season}")
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(SEASON_DIR))
            .with_context(|| format!("create checkpoint dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.artifact_path(key).exists()
    }

    /// Persists the artifact unless its key is already present. Returns whether it was written.
    pub fn write(&self, artifact: &TeamSeasonArtifact) -> Result<bool> {
        let path = self.artifact_path(&artifact.key());
        if path.exists() {
            return Ok(false);
        }
        let json = serde_json::to_string(artifact).context("serialize artifact")?;
        write_atomic(&path, &json)?;
        Ok(true)
    }

    /// Artifact files in key order.
    pub fn artifact_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("list checkpoint dir {}", self.dir.display()))?;
        let mut out = Vec::new();
        for entry in entries {
            let path = entry.context("read checkpoint dir entry")?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn read_artifact(&self, path: &Path) -> Result<TeamSeasonArtifact> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("decode {}", path.display()))
    }

    /// Cached index for `season`, if one was recorded for the same standings URL.
    pub fn season_index(&self, season: i32, standings_url: &str) -> Option<SeasonIndex> {
        let raw = fs::read_to_string(self.season_path(season)).ok()?;
        let index = serde_json::from_str::<SeasonIndex>(&raw).ok()?;
        (index.standings_url == standings_url).then_some(index)
    }

    pub fn write_season_index(&self, index: &SeasonIndex) -> Result<()> {
        let json = serde_json::to_string(index).context("serialize season index")?;
        write_atomic(&self.season_path(index.season), &json)
    }

    fn season_path(&self, season: i32) -> PathBuf {
        self.dir.join(SEASON_DIR).join(format!("season-{season}.json"))
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(team: &str, season: i32) -> TeamSeasonArtifact {
        let mut row = BTreeMap::new();
        row.insert("Date".to_string(), "2023-08-12".to_string());
        TeamSeasonArtifact {
            team: team.to_string(),
            season,
            rows: vec![row],
        }
    }

    #[test]
    fn write_once_then_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(tmp.path()).unwrap();
        let first = artifact("Nott'ham Forest", 2024);
        assert!(!store.contains(&first.key()));
        assert!(store.write(&first).unwrap());
        assert!(store.contains("Nott'ham Forest-2024"));

        let mut second = first.clone();
        second.rows.clear();
        assert!(!store.write(&second).unwrap());

        let paths = store.artifact_paths().unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(store.read_artifact(&paths[0]).unwrap(), first);
    }

    #[test]
    fn season_index_is_scoped_to_its_standings_url() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(tmp.path()).unwrap();
        let index = SeasonIndex {
            season: 2024,
            standings_url: "https://fbref.com/a".to_string(),
            teams: vec![TeamLink {
                name: "Arsenal".to_string(),
                url: "https://fbref.com/en/squads/x/Arsenal-Stats".to_string(),
            }],
            previous_url: None,
        };
        store.write_season_index(&index).unwrap();
        assert_eq!(store.season_index(2024, "https://fbref.com/a"), Some(index));
        assert_eq!(store.season_index(2024, "https://fbref.com/b"), None);
        assert!(store.artifact_paths().unwrap().is_empty());
    }
}
