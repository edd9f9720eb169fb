use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};

use crate::aggregate::CanonicalDataset;
use crate::model::{DATE_FORMAT, MatchRecord, MatchResult, Stat, StatLine};
use crate::pairing::{FeatureValue, PairedMatch};

const FEATURES_TABLE: &str = "fixture_features";

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            date TEXT NOT NULL,
            time TEXT NULL,
            round TEXT NULL,
            day TEXT NULL,
            venue TEXT NOT NULL,
            result TEXT NOT NULL,
            team TEXT NOT NULL,
            opponent TEXT NOT NULL,
            comp TEXT NOT NULL,
            season INTEGER NOT NULL,
            gf REAL NULL,
            ga REAL NULL,
            xga REAL NULL,
            xg REAL NULL,
            poss REAL NULL,
            sh REAL NULL,
            sot REAL NULL,
            dist REAL NULL,
            fk REAL NULL,
            pk REAL NULL,
            pkatt REAL NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_team_season ON matches(team, season);
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Replaces the stored canonical dataset.
pub fn save_dataset(conn: &mut Connection, dataset: &CanonicalDataset) -> Result<usize> {
    let updated_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin dataset transaction")?;
    tx.execute("DELETE FROM matches", [])
        .context("clear matches")?;
    for rec in &dataset.records {
        let s = |stat: Stat| rec.stat(stat);
        tx.execute(
            r#"
            INSERT INTO matches (
                date, time, round, day, venue, result, team, opponent, comp, season,
                gf, ga, xga, xg, poss, sh, sot, dist, fk, pk, pkatt, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
            )
            "#,
            params![
                rec.date.format(DATE_FORMAT).to_string(),
                rec.time,
                rec.round,
                rec.day,
                rec.venue,
                rec.result.code(),
                rec.team,
                rec.opponent,
                rec.competition,
                rec.season,
                s(Stat::Gf),
                s(Stat::Ga),
                s(Stat::Xga),
                s(Stat::Xg),
                s(Stat::Poss),
                s(Stat::Sh),
                s(Stat::Sot),
                s(Stat::Dist),
                s(Stat::Fk),
                s(Stat::Pk),
                s(Stat::Pkatt),
                updated_at,
            ],
        )
        .context("insert match")?;
    }
    tx.commit().context("commit dataset transaction")?;
    Ok(dataset.len())
}

pub fn load_dataset(conn: &Connection) -> Result<CanonicalDataset> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                date, time, round, day, venue, result, team, opponent, comp, season,
                gf, ga, xga, xg, poss, sh, sot, dist, fk, pk, pkatt
            FROM matches
            ORDER BY date ASC, team ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map([], |row| {
            let mut stats: StatLine = [None; Stat::COUNT];
            // Stat columns follow `Stat::ALL` order.
            for (offset, stat) in Stat::ALL.into_iter().enumerate() {
                stats[stat.index()] = row.get::<_, Option<f64>>(10 + offset)?;
            }
            Ok(StoredRow {
                date: row.get(0)?,
                time: row.get(1)?,
                round: row.get(2)?,
                day: row.get(3)?,
                venue: row.get(4)?,
                result: row.get(5)?,
                team: row.get(6)?,
                opponent: row.get(7)?,
                competition: row.get(8)?,
                season: row.get(9)?,
                stats,
            })
        })
        .context("query load matches")?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.context("decode match row")?.into_record()?);
    }
    Ok(CanonicalDataset::from_records(records))
}

struct StoredRow {
    date: String,
    time: Option<String>,
    round: Option<String>,
    day: Option<String>,
    venue: String,
    result: String,
    team: String,
    opponent: String,
    competition: String,
    season: i32,
    stats: StatLine,
}

impl StoredRow {
    fn into_record(self) -> Result<MatchRecord> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .with_context(|| format!("stored date {:?}", self.date))?;
        let result = MatchResult::parse(&self.result)
            .ok_or_else(|| anyhow!("stored result {:?}", self.result))?;
        Ok(MatchRecord {
            date,
            time: self.time,
            round: self.round,
            day: self.day,
            venue: self.venue,
            result,
            team: self.team,
            opponent: self.opponent,
            competition: self.competition,
            season: self.season,
            stats: self.stats,
        })
    }
}

/// Recreates the paired feature table from scratch.
pub fn save_features(conn: &mut Connection, pairs: &[PairedMatch]) -> Result<usize> {
    let columns = PairedMatch::column_names();
    let column_list = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction().context("begin features transaction")?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {FEATURES_TABLE}; CREATE TABLE {FEATURES_TABLE} ({column_list});"
    ))
    .context("create features table")?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {FEATURES_TABLE} ({column_list}) VALUES ({placeholders})"
            ))
            .context("prepare features insert")?;
        for pair in pairs {
            stmt.execute(params_from_iter(pair.values().into_iter().map(sql_value)))
                .context("insert feature row")?;
        }
    }
    tx.commit().context("commit features transaction")?;
    Ok(pairs.len())
}

pub fn count_features(conn: &Connection) -> Result<usize> {
    let n: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {FEATURES_TABLE}"), [], |row| {
            row.get(0)
        })
        .context("count feature rows")?;
    Ok(n as usize)
}

fn sql_value(value: FeatureValue) -> SqlValue {
    match value {
        FeatureValue::Text(s) => SqlValue::Text(s),
        FeatureValue::Int(n) => SqlValue::Integer(n),
        FeatureValue::Float(f) => SqlValue::Real(f),
        FeatureValue::Null => SqlValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(team: &str, day: u32) -> MatchRecord {
        let mut stats: StatLine = [Some(1.5); Stat::COUNT];
        stats[Stat::Dist.index()] = None;
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            time: Some("12:30".to_string()),
            round: Some("Matchweek 20".to_string()),
            day: Some("Sat".to_string()),
            venue: "Away".to_string(),
            result: MatchResult::Loss,
            team: team.to_string(),
            opponent: "Everton".to_string(),
            competition: "Premier League".to_string(),
            season: 2024,
            stats,
        }
    }

    #[test]
    fn dataset_survives_a_round_trip() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let dataset = CanonicalDataset::from_records(vec![record("B", 2), record("A", 1)]);
        assert_eq!(save_dataset(&mut conn, &dataset).unwrap(), 2);
        // Saving again replaces rather than appends.
        save_dataset(&mut conn, &dataset).unwrap();
        let loaded = load_dataset(&conn).unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn features_table_is_recreated() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        save_features(&mut conn, &[]).unwrap();
        assert_eq!(count_features(&conn).unwrap(), 0);
    }
}
