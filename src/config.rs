use std::path::PathBuf;

use chrono::{Datelike, Utc};

pub const SITE_ROOT: &str = "https://fbref.com";
pub const DEFAULT_START_URL: &str = "https://fbref.com/en/comps/9/Premier-League-Stats";
pub const DEFAULT_COMPETITION: &str = "Premier League";

const DATA_DIR: &str = "fbref_form";
const CHECKPOINT_DIR: &str = "checkpoints";
const DB_FILE: &str = "fbref_form.sqlite";
const EXPORT_FILE: &str = "fixture_features.xlsx";

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Standings page of the most recent season to visit.
    pub start_url: String,
    /// Season labels, most recent first. One standings page is visited per label.
    pub seasons: Vec<i32>,
    /// Value of the match log `Comp` column to keep.
    pub competition: String,
    pub squad_link_pattern: String,
    pub shooting_link_pattern: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            seasons: default_seasons(),
            competition: DEFAULT_COMPETITION.to_string(),
            squad_link_pattern: "/squads/".to_string(),
            shooting_link_pattern: "all_comps/shooting/".to_string(),
        }
    }
}

pub fn default_seasons() -> Vec<i32> {
    let year = Utc::now().year();
    vec![year, year - 1]
}

/// Parses a season list such as `2024,2023` or `2024 2023`, keeping order and dropping repeats.
pub fn parse_seasons(raw: &str) -> Vec<i32> {
    let mut out: Vec<i32> = Vec::new();
    for season in raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<i32>().ok())
    {
        if !out.contains(&season) {
            out.push(season);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let root = explicit
            .or_else(app_data_dir)
            .unwrap_or_else(|| PathBuf::from("data"));
        Self::new(root)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join(CHECKPOINT_DIR)
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    pub fn export_path(&self) -> PathBuf {
        self.root.join(EXPORT_FILE)
    }
}

pub fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_DATA_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(DATA_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seasons_keeps_order_and_dedups() {
        assert_eq!(parse_seasons("2024,2023 2024;2022"), vec![2024, 2023, 2022]);
        assert!(parse_seasons("abc").is_empty());
    }

    #[test]
    fn data_paths_hang_off_root() {
        let paths = DataPaths::new("/tmp/x");
        assert_eq!(paths.checkpoint_dir(), PathBuf::from("/tmp/x/checkpoints"));
        assert_eq!(paths.db_path(), PathBuf::from("/tmp/x/fbref_form.sqlite"));
    }
}
