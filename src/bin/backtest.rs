use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use epl_predictor::cli::{path_list_arg, value_arg};
use epl_predictor::config::Settings;
use epl_predictor::elo::{self, EloConfig, EloState};
use epl_predictor::history::{CsvHistory, MatchHistory, SqliteHistory};
use epl_predictor::matches::{self, MatchRecord};
use epl_predictor::metrics::{self, Metrics};
use epl_predictor::{Outcome, Prob3};

const DEFAULT_WARMUP: usize = 380;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let csv_files = path_list_arg(&args, "--csv");
    let db_path = value_arg::<PathBuf>(&args, "--db").unwrap_or_else(|| settings.db_path.clone());
    let warmup = value_arg::<usize>(&args, "--warmup").unwrap_or(DEFAULT_WARMUP);
    let home_adv_pts = value_arg::<f64>(&args, "--home-adv")
        .unwrap_or(settings.home_adv_pts)
        .clamp(0.0, 200.0);
    let elo_cfg = EloConfig {
        k: value_arg::<f64>(&args, "--k").unwrap_or(settings.elo_k).clamp(1.0, 100.0),
        base_rating: settings.elo_base,
    };

    let history: Box<dyn MatchHistory> = if csv_files.is_empty() {
        Box::new(SqliteHistory { db_path })
    } else {
        Box::new(CsvHistory { files: csv_files })
    };
    let mut rows = matches::completed_matches(&history.load_matches()?);
    matches::sort_chronological(&mut rows);
    if rows.len() <= warmup {
        return Err(anyhow!(
            "need more than {warmup} completed matches, found {}",
            rows.len()
        ));
    }

    let (predictions, outcomes) = walk_forward(&rows, &elo_cfg, home_adv_pts)
        .context("walk-forward rating pass failed")?;
    let scored_preds = &predictions[warmup..];
    let scored_outcomes = &outcomes[warmup..];

    let model = metrics::evaluate_probs(scored_preds, scored_outcomes);
    let uniform = metrics::evaluate_probs(
        &vec![Prob3::uniform(); scored_outcomes.len()],
        scored_outcomes,
    );
    let warmup_rates = metrics::empirical_outcome_probs(&outcomes[..warmup]);
    let empirical = metrics::evaluate_probs(
        &vec![warmup_rates; scored_outcomes.len()],
        scored_outcomes,
    );

    println!("Elo walk-forward backtest");
    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        println!("Range: {} -> {}", first.date, last.date);
    }
    println!(
        "Matches: {} (warmup {warmup}, scored {})",
        rows.len(),
        scored_outcomes.len()
    );
    println!(
        "k={:.1} home_adv={:.0} base={:.0}",
        elo_cfg.k, home_adv_pts, elo_cfg.base_rating
    );
    println!();

    print_metrics("Elo baseline", model);
    print_metrics("Uniform baseline", uniform);
    print_metrics("Empirical baseline (warmup rates)", empirical);
    println!();
    println!(
        "log-loss gain vs empirical: {:+.4}",
        empirical.log_loss - model.log_loss
    );

    Ok(())
}

/// Prices every match from ratings and draw rate known strictly before it.
fn walk_forward(
    rows: &[MatchRecord],
    cfg: &EloConfig,
    home_adv_pts: f64,
) -> epl_predictor::Result<(Vec<Prob3>, Vec<Outcome>)> {
    let mut state = EloState::new();
    let mut draws = 0usize;
    let mut predictions = Vec::with_capacity(rows.len());
    let mut outcomes = Vec::with_capacity(rows.len());

    for (idx, m) in rows.iter().enumerate() {
        let draw_rate = if idx == 0 {
            1.0 / 3.0
        } else {
            draws as f64 / idx as f64
        };
        let e = elo::expected_score(
            state.rating(&m.home_team, cfg) + home_adv_pts,
            state.rating(&m.away_team, cfg),
        );
        predictions.push(Prob3 {
            home: (1.0 - draw_rate) * e,
            draw: draw_rate,
            away: (1.0 - draw_rate) * (1.0 - e),
        });

        let (_, next) = state.step(m, idx, cfg)?;
        state = next;

        let outcome = m
            .full_time_result()
            .ok_or_else(|| epl_predictor::ForecastError::MissingResult {
                index: idx,
                home: m.home_team.clone(),
                away: m.away_team.clone(),
            })?;
        if outcome == Outcome::Draw {
            draws += 1;
        }
        outcomes.push(outcome);
    }

    Ok((predictions, outcomes))
}

fn print_metrics(label: &str, metrics: Metrics) {
    println!("{label}:");
    println!(
        "  samples={} brier={:.4} log_loss={:.4} accuracy={:.3}",
        metrics.samples, metrics.brier, metrics.log_loss, metrics.accuracy
    );
}
