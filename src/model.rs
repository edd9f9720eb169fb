use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchResult {
    Win,
    Draw,
    Loss,
}

impl MatchResult {
    /// Accepts `W`/`D`/`L`, also with a trailing score such as `W 2–1`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().chars().next()? {
            'W' | 'w' => Some(Self::Win),
            'D' | 'd' => Some(Self::Draw),
            'L' | 'l' => Some(Self::Loss),
            _ => None,
        }
    }

    pub fn points(self) -> u32 {
        match self {
            Self::Win => 3,
            Self::Draw => 1,
            Self::Loss => 0,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Win => "W",
            Self::Draw => "D",
            Self::Loss => "L",
        }
    }
}

/// Per-match numeric statistics carried through the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stat {
    Gf,
    Ga,
    Xga,
    Xg,
    Poss,
    Sh,
    Sot,
    Dist,
    Fk,
    Pk,
    Pkatt,
}

impl Stat {
    pub const COUNT: usize = 11;
    pub const ALL: [Stat; Stat::COUNT] = [
        Stat::Gf,
        Stat::Ga,
        Stat::Xga,
        Stat::Xg,
        Stat::Poss,
        Stat::Sh,
        Stat::Sot,
        Stat::Dist,
        Stat::Fk,
        Stat::Pk,
        Stat::Pkatt,
    ];

    /// Canonical (lower-case) field name.
    pub fn key(self) -> &'static str {
        match self {
            Stat::Gf => "gf",
            Stat::Ga => "ga",
            Stat::Xga => "xga",
            Stat::Xg => "xg",
            Stat::Poss => "poss",
            Stat::Sh => "sh",
            Stat::Sot => "sot",
            Stat::Dist => "dist",
            Stat::Fk => "fk",
            Stat::Pk => "pk",
            Stat::Pkatt => "pkatt",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub type StatLine = [Option<f64>; Stat::COUNT];

/// One team's view of one fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub time: Option<String>,
    pub round: Option<String>,
    pub day: Option<String>,
    pub venue: String,
    pub result: MatchResult,
    pub team: String,
    pub opponent: String,
    pub competition: String,
    pub season: i32,
    pub stats: StatLine,
}

impl MatchRecord {
    pub fn stat(&self, stat: Stat) -> Option<f64> {
        self.stats[stat.index()]
    }

    /// Builds a record from canonical (lower-cased) field names.
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Result<Self> {
        let date_raw = required(fields, "date")?;
        let date = NaiveDate::parse_from_str(date_raw, DATE_FORMAT)
            .with_context(|| format!("invalid date {date_raw:?}"))?;
        let result_raw = required(fields, "result")?;
        let result = MatchResult::parse(result_raw)
            .ok_or_else(|| anyhow!("invalid result {result_raw:?}"))?;
        let season_raw = required(fields, "season")?;
        let season = season_raw
            .parse::<i32>()
            .with_context(|| format!("invalid season {season_raw:?}"))?;

        let mut stats: StatLine = [None; Stat::COUNT];
        for stat in Stat::ALL {
            stats[stat.index()] = fields.get(stat.key()).and_then(|v| parse_stat(v));
        }

        Ok(Self {
            date,
            time: optional(fields, "time"),
            round: optional(fields, "round"),
            day: optional(fields, "day"),
            venue: required(fields, "venue")?.to_string(),
            result,
            team: required(fields, "team")?.to_string(),
            opponent: required(fields, "opponent")?.to_string(),
            competition: required(fields, "comp")?.to_string(),
            season,
            stats,
        })
    }

    /// Kick-off hour from an `HH:MM` time, if present.
    pub fn hour(&self) -> Option<u32> {
        let raw = self.time.as_deref()?;
        raw.split(':').next()?.trim().parse::<u32>().ok()
    }
}

fn required<'a>(fields: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("missing field {key}"))
}

fn optional(fields: &BTreeMap<String, String>, key: &str) -> Option<String> {
    fields
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Leading number of a stat cell; `2 (4)` after a shoot-out reads as 2, blank as missing.
pub fn parse_stat(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    let token = cleaned.split_whitespace().next()?;
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}
