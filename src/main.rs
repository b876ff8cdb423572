use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use epl_predictor::cli::{has_flag, path_list_arg, value_arg};
use epl_predictor::config::Settings;
use epl_predictor::features::{self, FEATURE_COLUMNS};
use epl_predictor::history::{self, CsvHistory, MatchHistory, SqliteHistory};
use epl_predictor::matches::{self, MatchRecord};
use epl_predictor::outcome::{self, OutcomePredictor};
use epl_predictor::predictor::EloPredictor;
use epl_predictor::season::{self, SeasonProjection};

const USAGE: &str = "usage: epl_predictor <command> [options]

commands:
  ingest FILE.csv...              load football-data CSVs into the sqlite store
  features [--out file.csv]       write the leakage-safe feature table
  predict HOME AWAY               baseline probabilities and current features
  simulate-match HOME AWAY        sample one fixture repeatedly [--samples N] [--seed S]
  simulate-season                 project final positions [--season TAG] [--rollouts N] [--seed S] [--json]
  config                          print resolved settings

common options:
  --db PATH       sqlite store (default EPL_DB_PATH)
  --csv FILES     read history from CSV files instead of the store
  --source TAG    source tag for ingested rows (default: file stem)";

const VALUE_FLAGS: [&str; 8] = [
    "--db",
    "--csv",
    "--source",
    "--out",
    "--samples",
    "--seed",
    "--rollouts",
    "--season",
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let settings = Settings::from_env();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let positional = positionals(&args);
    let Some(command) = positional.first() else {
        println!("{USAGE}");
        return Ok(());
    };

    match command.as_str() {
        "ingest" => run_ingest(&args, &settings),
        "features" => run_features(&args, &settings),
        "predict" => {
            let (home, away) = team_pair(&positional)?;
            run_predict(&args, &settings, home, away)
        }
        "simulate-match" => {
            let (home, away) = team_pair(&positional)?;
            run_simulate_match(&args, &settings, home, away)
        }
        "simulate-season" => run_simulate_season(&args, &settings),
        "config" => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => bail!("unknown command `{other}`\n\n{USAGE}"),
    }
}

fn run_ingest(args: &[String], settings: &Settings) -> Result<()> {
    let mut files = path_list_arg(args, "--csv");
    files.extend(positionals(args).into_iter().skip(1).map(PathBuf::from));
    if files.is_empty() {
        bail!("ingest needs at least one CSV file");
    }
    let source = value_arg::<String>(args, "--source");
    let db_path = db_path(args, settings);

    let mut conn = history::open_db(&db_path)
        .with_context(|| format!("unable to open {}", db_path.display()))?;
    let mut total = 0usize;
    for path in &files {
        let rows = history::read_csv(path, source.as_deref())
            .with_context(|| format!("unable to read {}", path.display()))?;
        let written = history::upsert_matches(&mut conn, &rows)?;
        println!("{}: {} rows", path.display(), written);
        total += written;
    }
    println!("DB: {}", db_path.display());
    println!("Upserted: {total}");
    Ok(())
}

fn run_features(args: &[String], settings: &Settings) -> Result<()> {
    let completed = matches::completed_matches(&load_history(args, settings)?);
    let table = features::prepare_features(&completed, &settings.features())?;

    match value_arg::<String>(args, "--out") {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("unable to create {path}"))?;
            features::write_csv(&table, BufWriter::new(file))?;
            println!("Wrote {} rows to {path}", table.rows.len());
        }
        None => features::write_csv(&table, io::stdout().lock())?,
    }
    Ok(())
}

fn run_predict(args: &[String], settings: &Settings, home: &str, away: &str) -> Result<()> {
    let completed = matches::completed_matches(&load_history(args, settings)?);
    let predictor = EloPredictor::from_history(&completed, &settings.predictor())?;
    let probs = predictor.predict(home, away)?;

    println!("{home} vs {away}");
    println!(
        "  home={:.3} draw={:.3} away={:.3}",
        probs.home, probs.draw, probs.away
    );

    let table = features::prepare_features(&completed, &settings.features())?;
    match features::team_snapshot(&table, home, away) {
        Ok(snapshot) => {
            println!("Latest pre-match features:");
            for (name, value) in FEATURE_COLUMNS.iter().zip(snapshot.values()) {
                println!("  {name:<24} {value:>8.2}");
            }
        }
        Err(err) => println!("No feature snapshot: {err}"),
    }
    Ok(())
}

fn run_simulate_match(args: &[String], settings: &Settings, home: &str, away: &str) -> Result<()> {
    let completed = matches::completed_matches(&load_history(args, settings)?);
    let predictor = EloPredictor::from_history(&completed, &settings.predictor())?;
    let samples = value_arg::<usize>(args, "--samples").unwrap_or(settings.match_samples);
    let seed = value_arg::<u64>(args, "--seed")
        .or(settings.seed)
        .unwrap_or_else(rand::random);

    let mut rng = StdRng::seed_from_u64(seed);
    let freq = outcome::simulate_match_distribution(home, away, &predictor, samples, &mut rng)?;

    println!("{home} vs {away} ({samples} samples, seed {seed})");
    println!(
        "  home={:.3} draw={:.3} away={:.3}",
        freq.home, freq.draw, freq.away
    );
    Ok(())
}

fn run_simulate_season(args: &[String], settings: &Settings) -> Result<()> {
    let rollouts = value_arg::<usize>(args, "--rollouts").unwrap_or(settings.rollouts);
    if rollouts == 0 || rollouts > settings.max_rollouts {
        bail!(
            "--rollouts must be between 1 and {} (got {rollouts})",
            settings.max_rollouts
        );
    }
    let season_tag = value_arg::<String>(args, "--season").unwrap_or_else(|| settings.current_season.clone());
    let cfg = settings.season(rollouts, value_arg::<u64>(args, "--seed"));

    let all = load_history(args, settings)?;
    let completed = matches::completed_matches(&all);
    let predictor = EloPredictor::from_history(&completed, &settings.predictor())?;
    info!(season = %season_tag, rollouts, "simulating season");
    let projection = season::simulate_season(&all, &season_tag, &predictor, &cfg)?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&projection)?);
        return Ok(());
    }

    match projection {
        SeasonProjection::SeasonComplete => {
            println!("Season {season_tag} is complete: no fixtures left to simulate.");
        }
        SeasonProjection::Projected(table) => {
            let mut out = io::stdout().lock();
            writeln!(out, "Season {season_tag} projection ({rollouts} rollouts)")?;
            writeln!(out, "{:<4} {:<24} {:>8} {:>5} {:>6}", "#", "Team", "AvgRank", "Best", "Worst")?;
            for (idx, row) in table.iter().enumerate() {
                writeln!(
                    out,
                    "{:<4} {:<24} {:>8.2} {:>5} {:>6}",
                    idx + 1,
                    row.team,
                    row.average_final_rank,
                    row.best_rank,
                    row.worst_rank
                )?;
            }
        }
    }
    Ok(())
}

fn load_history(args: &[String], settings: &Settings) -> Result<Vec<MatchRecord>> {
    let files = path_list_arg(args, "--csv");
    let source: Box<dyn MatchHistory> = if files.is_empty() {
        Box::new(SqliteHistory {
            db_path: db_path(args, settings),
        })
    } else {
        Box::new(CsvHistory { files })
    };
    let rows = source.load_matches()?;
    if rows.is_empty() {
        return Err(anyhow!("no matches found; run `ingest` or pass --csv"));
    }
    Ok(rows)
}

fn team_pair(positional: &[String]) -> Result<(&str, &str)> {
    match positional {
        [_, home, away, ..] => Ok((home.as_str(), away.as_str())),
        _ => bail!("expected HOME and AWAY team names"),
    }
}

fn db_path(args: &[String], settings: &Settings) -> PathBuf {
    value_arg::<PathBuf>(args, "--db").unwrap_or_else(|| settings.db_path.clone())
}

/// Arguments that are neither flags nor the value following a value flag.
fn positionals(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = VALUE_FLAGS.contains(&arg.as_str());
            continue;
        }
        out.push(arg.clone());
    }
    out
}
