use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fbref_form::aggregate::{self, CanonicalDataset};
use fbref_form::checkpoint::CheckpointStore;
use fbref_form::config::{
    CrawlConfig, DEFAULT_COMPETITION, DEFAULT_START_URL, DataPaths, default_seasons, parse_seasons,
};
use fbref_form::crawl::{CrawlController, CrawlSummary};
use fbref_form::dataset;
use fbref_form::export;
use fbref_form::extract::HtmlExtractor;
use fbref_form::fetch::{
    Backoff, DEFAULT_BASE_DELAY_SECS, DEFAULT_MAX_DELAY_SECS, DEFAULT_PACING_SECS, FetchClient,
    RetryPolicy,
};
use fbref_form::http_client::REQUEST_TIMEOUT_SECS;
use fbref_form::pairing::PairingOptions;
use fbref_form::pipeline::{FeatureTable, build_feature_table};
use fbref_form::team_names::TeamNames;

/// Crawl fbref match logs and build paired rolling-form features.
#[derive(Parser, Debug)]
#[command(name = "fbref_form", version)]
struct Cli {
    /// Root for checkpoints, the sqlite dataset and exports.
    #[arg(long, global = true, env = "FBREF_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch missing team-season checkpoints.
    Crawl(CrawlArgs),
    /// Merge checkpoints into the canonical sqlite dataset.
    Aggregate,
    /// Build rolling and paired features from the canonical dataset.
    Features(FeatureArgs),
    /// Write the paired feature table to an xlsx workbook.
    Export {
        #[command(flatten)]
        features: FeatureArgs,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Crawl, aggregate and build features in one go.
    Run {
        #[command(flatten)]
        crawl: CrawlArgs,
        #[command(flatten)]
        features: FeatureArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct CrawlArgs {
    /// Standings page of the most recent season.
    #[arg(long, env = "FBREF_START_URL", default_value = DEFAULT_START_URL)]
    start_url: String,

    /// Season labels, most recent first (e.g. `2024,2023`).
    #[arg(long, env = "FBREF_SEASONS")]
    seasons: Option<String>,

    #[arg(long, env = "FBREF_COMPETITION", default_value = DEFAULT_COMPETITION)]
    competition: String,

    #[arg(long, env = "FBREF_BASE_DELAY_SECS", default_value_t = DEFAULT_BASE_DELAY_SECS)]
    base_delay_secs: u64,

    #[arg(long, env = "FBREF_MAX_DELAY_SECS", default_value_t = DEFAULT_MAX_DELAY_SECS)]
    max_delay_secs: u64,

    /// Give up on a URL after this many attempts. Unset retries forever.
    #[arg(long, env = "FBREF_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Pause between consecutive requests.
    #[arg(long, env = "FBREF_PACING_SECS", default_value_t = DEFAULT_PACING_SECS)]
    pacing_secs: u64,

    #[arg(long, env = "FBREF_TIMEOUT_SECS", default_value_t = REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl CrawlArgs {
    fn crawl_config(&self) -> Result<CrawlConfig> {
        let seasons = match self.seasons.as_deref() {
            Some(raw) => parse_seasons(raw),
            None => default_seasons(),
        };
        if seasons.is_empty() {
            return Err(anyhow!("no seasons resolved for crawl"));
        }
        Ok(CrawlConfig {
            start_url: self.start_url.clone(),
            seasons,
            competition: self.competition.clone(),
            ..CrawlConfig::default()
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(self.base_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            max_attempts: self.max_attempts,
            pacing: Duration::from_secs(self.pacing_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Args, Debug, Clone)]
struct FeatureArgs {
    /// Emit every fixture twice, once with each side in the `_home` slot. This is
    /// the two-rows-per-fixture shape of the self-joined training table.
    #[arg(long, env = "FBREF_MIRRORED")]
    mirrored: bool,
}

impl FeatureArgs {
    fn pairing_options(&self) -> PairingOptions {
        PairingOptions {
            mirrored: self.mirrored,
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let cli = Cli::parse();
    let paths = DataPaths::resolve(cli.data_dir);

    match cli.command {
        Command::Crawl(args) => {
            run_crawl(&paths, &args)?;
        }
        Command::Aggregate => {
            run_aggregate(&paths)?;
        }
        Command::Features(args) => {
            let dataset = load_dataset(&paths)?;
            run_features(&paths, &dataset, &args)?;
        }
        Command::Export { features, out } => {
            let dataset = load_dataset(&paths)?;
            let table = build_feature_table(
                &dataset,
                &TeamNames::premier_league(),
                features.pairing_options(),
            );
            let out = out.unwrap_or_else(|| paths.export_path());
            let report = export::export_features(&out, &table.pairs)?;
            println!(
                "Exported {} fixtures x {} columns to {}",
                report.rows,
                report.columns,
                out.display()
            );
        }
        Command::Run { crawl, features } => {
            run_crawl(&paths, &crawl)?;
            let dataset = run_aggregate(&paths)?;
            run_features(&paths, &dataset, &features)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_crawl(paths: &DataPaths, args: &CrawlArgs) -> Result<CrawlSummary> {
    let config = args.crawl_config()?;
    let policy = args.retry_policy();
    let store = CheckpointStore::open(paths.checkpoint_dir())?;
    let fetcher = FetchClient::new(policy)?;
    let extractor = HtmlExtractor::for_site()?;

    let mut controller =
        CrawlController::new(fetcher, extractor, store, config, Backoff::from_policy(&policy));
    let summary = controller.run();

    println!("Crawl complete");
    println!("Checkpoints: {}", paths.checkpoint_dir().display());
    println!("Seasons visited: {}", summary.seasons_visited);
    println!(
        "Team-seasons fetched: {} (already checkpointed: {})",
        summary.teams_fetched, summary.teams_skipped
    );
    println!("Rows written: {}", summary.rows_written);
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!(" - {err}");
        }
    }
    Ok(summary)
}

fn run_aggregate(paths: &DataPaths) -> Result<CanonicalDataset> {
    let store = CheckpointStore::open(paths.checkpoint_dir())?;
    let (dataset, report) = aggregate::aggregate(&store)?;
    let mut conn = dataset::open_db(&paths.db_path())?;
    dataset::save_dataset(&mut conn, &dataset)?;

    println!("Aggregated {} artifacts", report.artifacts);
    println!("DB: {}", paths.db_path().display());
    println!("Rows: {} (skipped {})", report.rows, report.skipped_rows);
    for err in report.errors.iter().take(8) {
        println!(" - {err}");
    }
    Ok(dataset)
}

fn load_dataset(paths: &DataPaths) -> Result<CanonicalDataset> {
    let conn = dataset::open_db(&paths.db_path())?;
    let dataset = dataset::load_dataset(&conn)?;
    if dataset.is_empty() {
        return Err(anyhow!(
            "canonical dataset at {} is empty; run `aggregate` first",
            paths.db_path().display()
        ));
    }
    Ok(dataset)
}

fn run_features(paths: &DataPaths, dataset: &CanonicalDataset, args: &FeatureArgs) -> Result<FeatureTable> {
    let table = build_feature_table(dataset, &TeamNames::premier_league(), args.pairing_options());
    let mut conn = dataset::open_db(&paths.db_path())?;
    dataset::save_features(&mut conn, &table.pairs).context("store feature table")?;

    println!("Rolling rows: {}", table.rolling_rows);
    println!("Paired fixtures: {}", table.pairs.len());
    Ok(table)
}
