use std::collections::BTreeMap;

use crate::model::{DATE_FORMAT, Stat};
use crate::rolling::RollingFeatureRow;

#[derive(Debug, Clone, Copy, Default)]
pub struct PairingOptions {
    /// Also emit each fixture with the sides swapped, giving two rows per
    /// fixture like a self-join of the rolling table on `fixture_id`.
    pub mirrored: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairedMatch {
    pub fixture_id: String,
    pub home: RollingFeatureRow,
    pub away: RollingFeatureRow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
}

/// `<date>_<team>_<team>` with the two names in lexicographic order.
pub fn fixture_id(row: &RollingFeatureRow) -> String {
    let rec = &row.record;
    let (first, second) = if rec.team <= rec.opponent {
        (&rec.team, &rec.opponent)
    } else {
        (&rec.opponent, &rec.team)
    };
    format!("{}_{first}_{second}", rec.date.format(DATE_FORMAT))
}

/// Joins the two perspectives of each fixture. Fixtures seen fewer or more than
/// twice, or twice from the same team, are dropped.
pub fn pair_matches(rows: &[RollingFeatureRow], options: PairingOptions) -> Vec<PairedMatch> {
    let mut by_fixture: BTreeMap<String, Vec<&RollingFeatureRow>> = BTreeMap::new();
    for row in rows {
        by_fixture.entry(fixture_id(row)).or_default().push(row);
    }

    let mut out = Vec::new();
    for (id, sides) in by_fixture {
        let [a, b] = sides.as_slice() else {
            continue;
        };
        if a.record.team == b.record.team {
            continue;
        }
        let (home, away) = if a.record.team < b.record.team {
            (*a, *b)
        } else {
            (*b, *a)
        };
        if options.mirrored {
            out.push(PairedMatch {
                fixture_id: id.clone(),
                home: away.clone(),
                away: home.clone(),
            });
        }
        out.push(PairedMatch {
            fixture_id: id,
            home: home.clone(),
            away: away.clone(),
        });
    }
    out
}

fn side_field_names() -> Vec<String> {
    let mut names: Vec<String> = [
        "date",
        "team",
        "opponent",
        "venue",
        "result",
        "comp",
        "season",
        "hour",
        "day_code",
        "venue_code",
        "team_code",
        "target",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    names.extend(Stat::ALL.iter().map(|s| format!("{}_rolling", s.key())));
    names.push("form_rolling".to_string());
    names
}

fn side_values(row: &RollingFeatureRow) -> Vec<FeatureValue> {
    let rec = &row.record;
    let mut values = vec![
        FeatureValue::Text(rec.date.format(DATE_FORMAT).to_string()),
        FeatureValue::Text(rec.team.clone()),
        FeatureValue::Text(rec.opponent.clone()),
        FeatureValue::Text(rec.venue.clone()),
        FeatureValue::Text(rec.result.code().to_string()),
        FeatureValue::Text(rec.competition.clone()),
        FeatureValue::Int(rec.season as i64),
        row.hour
            .map(|h| FeatureValue::Int(h as i64))
            .unwrap_or(FeatureValue::Null),
        FeatureValue::Int(row.day_code as i64),
        FeatureValue::Int(row.venue_code as i64),
        FeatureValue::Int(row.team_code as i64),
        FeatureValue::Int(row.target as i64),
    ];
    values.extend(Stat::ALL.iter().map(|s| FeatureValue::Float(row.rolling(*s))));
    values.push(FeatureValue::Int(row.form as i64));
    values
}

impl PairedMatch {
    /// Flat column names: `fixture_id`, then every side field suffixed `_home` and `_away`.
    pub fn column_names() -> Vec<String> {
        let fields = side_field_names();
        let mut out = vec!["fixture_id".to_string()];
        for suffix in ["home", "away"] {
            out.extend(fields.iter().map(|f| format!("{f}_{suffix}")));
        }
        out
    }

    /// Values in [`PairedMatch::column_names`] order.
    pub fn values(&self) -> Vec<FeatureValue> {
        let mut out = vec![FeatureValue::Text(self.fixture_id.clone())];
        out.extend(side_values(&self.home));
        out.extend(side_values(&self.away));
        out
    }
}
