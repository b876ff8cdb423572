use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::elo::{self, EloConfig};
use crate::error::{ForecastError, Result};
use crate::matches::{MatchRecord, sort_chronological};
use crate::metrics;
use crate::outcome::{OutcomePredictor, Prob3};

/// Returns the same triple for every fixture. Used for explicit fallbacks and
/// deterministic test doubles.
#[derive(Debug, Clone, Copy)]
pub struct FixedPredictor(pub Prob3);

impl OutcomePredictor for FixedPredictor {
    fn predict(&self, _home_team: &str, _away_team: &str) -> Result<Prob3> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EloPredictorConfig {
    pub elo: EloConfig,
    pub home_adv_pts: f64,
}

impl Default for EloPredictorConfig {
    fn default() -> Self {
        Self {
            elo: EloConfig::default(),
            home_adv_pts: 60.0,
        }
    }
}

/// Baseline predictor from end-of-history Elo ratings. The draw share is the
/// empirical draw rate of the history; the rest is split by expected score.
#[derive(Debug, Clone)]
pub struct EloPredictor {
    ratings: HashMap<String, f64>,
    home_adv_pts: f64,
    draw_rate: f64,
}

impl EloPredictor {
    /// `matches` must all be completed.
    pub fn from_history(matches: &[MatchRecord], cfg: &EloPredictorConfig) -> Result<Self> {
        let mut ordered = matches.to_vec();
        sort_chronological(&mut ordered);

        let pass = elo::compute_ratings(&ordered, &cfg.elo)?;
        let outcomes: Vec<_> = ordered.iter().filter_map(|m| m.full_time_result()).collect();
        let draw_rate = metrics::empirical_outcome_probs(&outcomes).draw;

        info!(
            teams = pass.final_state.len(),
            matches = ordered.len(),
            draw_rate,
            "elo predictor fitted"
        );

        Ok(Self {
            ratings: pass.final_state.ratings().clone(),
            home_adv_pts: cfg.home_adv_pts,
            draw_rate,
        })
    }

    pub fn from_ratings(ratings: HashMap<String, f64>, home_adv_pts: f64, draw_rate: f64) -> Self {
        Self {
            ratings,
            home_adv_pts,
            draw_rate: draw_rate.clamp(0.0, 1.0),
        }
    }

    pub fn rating(&self, team: &str) -> Option<f64> {
        self.ratings.get(team).copied()
    }

    pub fn draw_rate(&self) -> f64 {
        self.draw_rate
    }

    fn lookup(&self, team: &str) -> Result<f64> {
        self.rating(team).ok_or_else(|| ForecastError::UnknownTeam {
            team: team.to_string(),
        })
    }
}

impl OutcomePredictor for EloPredictor {
    fn predict(&self, home_team: &str, away_team: &str) -> Result<Prob3> {
        let rh = self.lookup(home_team)?;
        let ra = self.lookup(away_team)?;
        let e = elo::expected_score(rh + self.home_adv_pts, ra);
        let decisive = 1.0 - self.draw_rate;
        Ok(Prob3 {
            home: decisive * e,
            draw: self.draw_rate,
            away: decisive * (1.0 - e),
        })
    }
}
