use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::matches::{MatchRecord, ensure_chronological};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EloConfig {
    pub k: f64,
    pub base_rating: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k: 20.0,
            base_rating: 1500.0,
        }
    }
}

/// Ratings of both sides as they stood before kickoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingPair {
    pub home: f64,
    pub away: f64,
}

/// Team ratings after some prefix of the match sequence. Teams that have not
/// played yet are absent and read as the base rating.
#[derive(Debug, Clone, Default)]
pub struct EloState {
    ratings: HashMap<String, f64>,
}

impl EloState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rating(&self, team: &str, cfg: &EloConfig) -> f64 {
        self.ratings.get(team).copied().unwrap_or(cfg.base_rating)
    }

    pub fn get(&self, team: &str) -> Option<f64> {
        self.ratings.get(team).copied()
    }

    pub fn ratings(&self) -> &HashMap<String, f64> {
        &self.ratings
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Applies one completed match. Both updates read the same pre-match
    /// ratings; the returned pair is the pre-match snapshot.
    pub fn step(
        mut self,
        m: &MatchRecord,
        index: usize,
        cfg: &EloConfig,
    ) -> Result<(RatingPair, EloState)> {
        m.validate(index)?;
        let (home_goals, away_goals) = m.require_goals(index)?;

        let rh = self.rating(&m.home_team, cfg);
        let ra = self.rating(&m.away_team, cfg);

        let expected_home = expected_score(rh, ra);
        let expected_away = expected_score(ra, rh);
        let actual_home = actual_score(home_goals, away_goals);
        let actual_away = 1.0 - actual_home;

        self.ratings
            .insert(m.home_team.clone(), rh + cfg.k * (actual_home - expected_home));
        self.ratings
            .insert(m.away_team.clone(), ra + cfg.k * (actual_away - expected_away));

        Ok((RatingPair { home: rh, away: ra }, self))
    }
}

#[derive(Debug, Clone)]
pub struct RatingPass {
    /// One entry per input match, in input order.
    pub pre_match: Vec<RatingPair>,
    pub final_state: EloState,
}

/// Runs the rating process over a chronologically ordered slice of completed
/// matches. Any missing score aborts the pass.
pub fn compute_ratings(matches: &[MatchRecord], cfg: &EloConfig) -> Result<RatingPass> {
    ensure_chronological(matches)?;

    let (pre_match, final_state) = matches.iter().enumerate().try_fold(
        (Vec::with_capacity(matches.len()), EloState::new()),
        |(mut pairs, state), (idx, m)| {
            let (pair, next) = state.step(m, idx, cfg)?;
            pairs.push(pair);
            Ok::<_, crate::error::ForecastError>((pairs, next))
        },
    )?;

    debug!(
        matches = matches.len(),
        teams = final_state.len(),
        "elo rating pass complete"
    );

    Ok(RatingPass {
        pre_match,
        final_state,
    })
}

/// Logistic expected score of `r_a` against `r_b`.
pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((r_b - r_a) / 400.0))
}

pub fn actual_score(home_goals: u8, away_goals: u8) -> f64 {
    if home_goals > away_goals {
        1.0
    } else if home_goals < away_goals {
        0.0
    } else {
        0.5
    }
}
