use chrono::{Duration, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use epl_predictor::elo::{self, EloConfig};
use epl_predictor::features::{self, FeatureConfig};
use epl_predictor::form::{self, FormConfig};
use epl_predictor::predictor::FixedPredictor;
use epl_predictor::season::{self, SeasonConfig};
use epl_predictor::{MatchRecord, Prob3};

const TEAMS: usize = 20;

/// Double round robin per season; the last season stops halfway.
fn synthetic_league(seasons: usize) -> Vec<MatchRecord> {
    let names: Vec<String> = (0..TEAMS).map(|i| format!("Team {i:02}")).collect();
    let start = NaiveDate::from_ymd_opt(2015, 8, 1).unwrap_or_default();
    let mut out = Vec::new();
    for s in 0..seasons {
        let tag = format!("{:02}{:02}_E0", 15 + s, 16 + s);
        let last = s + 1 == seasons;
        let mut n = 0usize;
        for h in 0..TEAMS {
            for a in 0..TEAMS {
                if h == a {
                    continue;
                }
                let date = start + Duration::days((s * 365 + n / 10 * 7) as i64);
                if last && n >= TEAMS * (TEAMS - 1) / 2 {
                    out.push(MatchRecord::fixture(date, &names[h], &names[a], &tag));
                } else {
                    let hg = ((h * 7 + a * 3 + s) % 4) as u8;
                    let ag = ((a * 5 + h + s) % 3) as u8;
                    out.push(MatchRecord::completed(date, &names[h], &names[a], hg, ag, &tag));
                }
                n += 1;
            }
        }
    }
    out.sort_by_key(|m| m.date);
    out
}

fn bench_rating_pass(c: &mut Criterion) {
    let rows: Vec<MatchRecord> = synthetic_league(5)
        .into_iter()
        .filter(|m| m.is_completed())
        .collect();
    let cfg = EloConfig::default();
    c.bench_function("elo_rating_pass", |b| {
        b.iter(|| {
            let pass = elo::compute_ratings(black_box(&rows), &cfg).unwrap();
            black_box(pass.final_state.len());
        })
    });
}

fn bench_form_pass(c: &mut Criterion) {
    let rows: Vec<MatchRecord> = synthetic_league(5)
        .into_iter()
        .filter(|m| m.is_completed())
        .collect();
    let cfg = FormConfig::default();
    c.bench_function("rolling_form_pass", |b| {
        b.iter(|| {
            let out = form::compute_form(black_box(&rows), &cfg).unwrap();
            black_box(out.len());
        })
    });

    let feature_cfg = FeatureConfig::default();
    c.bench_function("prepare_features", |b| {
        b.iter(|| {
            let table = features::prepare_features(black_box(&rows), &feature_cfg).unwrap();
            black_box(table.rows.len());
        })
    });
}

fn bench_season_simulation(c: &mut Criterion) {
    let rows = synthetic_league(2);
    let predictor = FixedPredictor(Prob3::new(0.46, 0.26, 0.28));
    let cfg = SeasonConfig {
        rollouts: 100,
        seed: Some(7),
        parallel: true,
    };
    c.bench_function("season_simulation_100", |b| {
        b.iter(|| {
            let out = season::simulate_season(black_box(&rows), "1617", &predictor, &cfg).unwrap();
            black_box(out);
        })
    });
}

criterion_group!(
    perf,
    bench_rating_pass,
    bench_form_pass,
    bench_season_simulation
);
criterion_main!(perf);
