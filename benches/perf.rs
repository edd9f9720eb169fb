use chrono::{Days, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use fbref_form::aggregate::CanonicalDataset;
use fbref_form::extract::{HtmlExtractor, PageExtractor, TableQuery};
use fbref_form::model::{MatchRecord, MatchResult, Stat, StatLine};
use fbref_form::pairing::{PairingOptions, pair_matches};
use fbref_form::rolling::build_rolling_features;

const TEAMS: usize = 20;

fn side(
    team: usize,
    opponent: usize,
    date: NaiveDate,
    venue: &str,
    result: MatchResult,
    seed: usize,
) -> MatchRecord {
    let mut stats: StatLine = [None; Stat::COUNT];
    for stat in Stat::ALL {
        stats[stat.index()] = Some(((seed * 7 + stat.index() * 3) % 11) as f64);
    }
    MatchRecord {
        date,
        time: Some("15:00".to_string()),
        round: None,
        day: None,
        venue: venue.to_string(),
        result,
        team: format!("Team {team:02}"),
        opponent: format!("Team {opponent:02}"),
        competition: "Premier League".to_string(),
        season: 2024,
        stats,
    }
}

/// Double round robin, both perspectives of every fixture.
fn sample_season() -> CanonicalDataset {
    let start = NaiveDate::from_ymd_opt(2023, 8, 12).unwrap();
    let mut records = Vec::new();
    let mut n = 0usize;
    for home in 0..TEAMS {
        for away in 0..TEAMS {
            if home == away {
                continue;
            }
            let date = start + Days::new(((home + away * 3) % 270) as u64);
            let (home_result, away_result) = match n % 3 {
                0 => (MatchResult::Win, MatchResult::Loss),
                1 => (MatchResult::Draw, MatchResult::Draw),
                _ => (MatchResult::Loss, MatchResult::Win),
            };
            records.push(side(home, away, date, "Home", home_result, n));
            records.push(side(away, home, date, "Away", away_result, n + 1));
            n += 1;
        }
    }
    CanonicalDataset::from_records(records)
}

fn bench_rolling_features(c: &mut Criterion) {
    let dataset = sample_season();
    c.bench_function("rolling_features", |b| {
        b.iter(|| {
            let rows = build_rolling_features(black_box(&dataset));
            black_box(rows.len());
        })
    });
}

fn bench_pairing(c: &mut Criterion) {
    let rows = build_rolling_features(&sample_season());
    c.bench_function("pair_matches", |b| {
        b.iter(|| {
            let pairs = pair_matches(black_box(&rows), PairingOptions::default());
            black_box(pairs.len());
        })
    });
}

fn bench_standings_links(c: &mut Criterion) {
    let extractor = HtmlExtractor::for_site().unwrap();
    c.bench_function("standings_links", |b| {
        b.iter(|| {
            let links = extractor
                .extract_table_links(
                    black_box(STANDINGS_HTML),
                    &TableQuery::css("table.stats_table", 0),
                    "/squads/",
                )
                .unwrap();
            black_box(links.len());
        })
    });
}

criterion_group!(
    perf,
    bench_rolling_features,
    bench_pairing,
    bench_standings_links
);
criterion_main!(perf);

static STANDINGS_HTML: &str = include_str!("../tests/fixtures/standings_2024.html");
