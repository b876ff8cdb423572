use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::elo::{self, EloConfig, EloState};
use crate::error::{ForecastError, Result};
use crate::form::{self, FormConfig};
use crate::matches::MatchRecord;

/// Column order handed to the prediction model. Changing it breaks trained models.
pub const FEATURE_COLUMNS: [&str; 8] = [
    "home_rating",
    "away_rating",
    "home_form_points",
    "away_form_points",
    "home_form_goals_for",
    "away_form_goals_for",
    "home_form_goals_against",
    "away_form_goals_against",
];

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FeatureConfig {
    pub elo: EloConfig,
    pub form: FormConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    pub home_rating: f64,
    pub away_rating: f64,
    pub home_form_points: f64,
    pub away_form_points: f64,
    pub home_form_goals_for: f64,
    pub away_form_goals_for: f64,
    pub home_form_goals_against: f64,
    pub away_form_goals_against: f64,
}

impl FeatureVector {
    /// Values in [`FEATURE_COLUMNS`] order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.home_rating,
            self.away_rating,
            self.home_form_points,
            self.away_form_points,
            self.home_form_goals_for,
            self.away_form_goals_for,
            self.home_form_goals_against,
            self.away_form_goals_against,
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub features: FeatureVector,
    pub target: u8,
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Chronological, one per input match.
    pub rows: Vec<FeatureRow>,
    pub columns: Vec<&'static str>,
    /// Ratings after the last match, for callers that need current strength.
    pub final_ratings: EloState,
}

/// Builds the training table: pre-match ratings and form for both sides plus the
/// encoded full-time result. Every input match must be completed; row errors
/// carry the position in `matches`, not in the sorted table.
pub fn prepare_features(matches: &[MatchRecord], cfg: &FeatureConfig) -> Result<FeatureTable> {
    // Stable, so same-date matches keep input order.
    let mut order: Vec<usize> = (0..matches.len()).collect();
    order.sort_by_key(|&i| matches[i].date);

    let mut targets = Vec::with_capacity(matches.len());
    for &input_idx in &order {
        let m = &matches[input_idx];
        m.validate(input_idx)?;
        let result = m.full_time_result().ok_or_else(|| ForecastError::MissingResult {
            index: input_idx,
            home: m.home_team.clone(),
            away: m.away_team.clone(),
        })?;
        targets.push(result.target());
    }
    let ordered: Vec<MatchRecord> = order.iter().map(|&i| matches[i].clone()).collect();

    let ratings = elo::compute_ratings(&ordered, &cfg.elo)?;
    let form = form::compute_form(&ordered, &cfg.form)?;

    let rows: Vec<FeatureRow> = ordered
        .into_iter()
        .zip(ratings.pre_match)
        .zip(form)
        .zip(targets)
        .map(|(((m, r), f), target)| FeatureRow {
            date: m.date,
            features: FeatureVector {
                home_rating: r.home,
                away_rating: r.away,
                home_form_points: f.home.points,
                away_form_points: f.away.points,
                home_form_goals_for: f.home.goals_for,
                away_form_goals_for: f.away.goals_for,
                home_form_goals_against: f.home.goals_against,
                away_form_goals_against: f.away.goals_against,
            },
            home_team: m.home_team,
            away_team: m.away_team,
            target,
        })
        .collect();

    info!(rows = rows.len(), "feature table prepared");

    Ok(FeatureTable {
        rows,
        columns: FEATURE_COLUMNS.to_vec(),
        final_ratings: ratings.final_state,
    })
}

/// Model input for an upcoming fixture, taken from the home team's latest home
/// row and the away team's latest away row. These are pre-match values of those
/// rows, so the last result of each team is not yet reflected.
pub fn team_snapshot(table: &FeatureTable, home_team: &str, away_team: &str) -> Result<FeatureVector> {
    let home = table
        .rows
        .iter()
        .rev()
        .find(|r| r.home_team == home_team)
        .ok_or_else(|| ForecastError::UnknownTeam {
            team: home_team.to_string(),
        })?;
    let away = table
        .rows
        .iter()
        .rev()
        .find(|r| r.away_team == away_team)
        .ok_or_else(|| ForecastError::UnknownTeam {
            team: away_team.to_string(),
        })?;

    Ok(FeatureVector {
        home_rating: home.features.home_rating,
        away_rating: away.features.away_rating,
        home_form_points: home.features.home_form_points,
        away_form_points: away.features.away_form_points,
        home_form_goals_for: home.features.home_form_goals_for,
        away_form_goals_for: away.features.away_form_goals_for,
        home_form_goals_against: home.features.home_form_goals_against,
        away_form_goals_against: away.features.away_form_goals_against,
    })
}

/// Writes the table as CSV: identifying columns, features, then `target`.
pub fn write_csv<W: Write>(table: &FeatureTable, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec!["date", "home_team", "away_team"];
    header.extend(table.columns.iter().copied());
    header.push("target");
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![
            row.date.format("%Y-%m-%d").to_string(),
            row.home_team.clone(),
            row.away_team.clone(),
        ];
        record.extend(row.features.values().iter().map(|v| v.to_string()));
        record.push(row.target.to_string());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
