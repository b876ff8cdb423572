use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn from_goals(home_goals: u8, away_goals: u8) -> Self {
        if home_goals > away_goals {
            Outcome::Home
        } else if home_goals < away_goals {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }

    /// Parses the football-data `FTR` column (`H`, `D`, `A`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "H" => Some(Outcome::Home),
            "D" => Some(Outcome::Draw),
            "A" => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Outcome::Home => "H",
            Outcome::Draw => "D",
            Outcome::Away => "A",
        }
    }

    /// Class index used as the training target: H=0, D=1, A=2.
    pub fn target(self) -> u8 {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 2,
        }
    }

    /// League points awarded as (home, away).
    pub fn points(self) -> (u32, u32) {
        match self {
            Outcome::Home => (3, 0),
            Outcome::Draw => (1, 1),
            Outcome::Away => (0, 3),
        }
    }
}

/// Probability triple over {Home, Draw, Away}. Not necessarily normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

/// Distribution substituted when the predictor cannot price a fixture.
pub const FALLBACK_PROBS: Prob3 = Prob3 {
    home: 0.4,
    draw: 0.3,
    away: 0.3,
};

impl Prob3 {
    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self { home, draw, away }
    }

    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    /// Divides each component by the total. Negative, non-finite or all-zero
    /// inputs are rejected instead of producing NaN weights.
    pub fn normalized(&self) -> Result<Prob3> {
        let parts = [self.home, self.draw, self.away];
        let sum = self.sum();
        if parts.iter().any(|p| !p.is_finite() || *p < 0.0) || sum <= 0.0 || !sum.is_finite() {
            return Err(ForecastError::DegenerateDistribution {
                home: self.home,
                draw: self.draw,
                away: self.away,
            });
        }
        Ok(Prob3 {
            home: self.home / sum,
            draw: self.draw / sum,
            away: self.away / sum,
        })
    }
}

/// Opaque source of match probabilities, e.g. a trained classifier.
pub trait OutcomePredictor: Send + Sync {
    fn predict(&self, home_team: &str, away_team: &str) -> Result<Prob3>;
}

/// Draws one outcome using the normalized triple as categorical weights.
pub fn sample_outcome<R: Rng + ?Sized>(probs: Prob3, rng: &mut R) -> Result<Outcome> {
    let p = probs.normalized()?;
    let dist = WeightedIndex::<f64>::new([p.home, p.draw, p.away]).map_err(|_| {
        ForecastError::DegenerateDistribution {
            home: probs.home,
            draw: probs.draw,
            away: probs.away,
        }
    })?;
    Ok(Outcome::ALL[dist.sample(rng)])
}

/// Asks the predictor for a fixture, substituting [`FALLBACK_PROBS`] when the
/// failure is a lookup miss. Other errors propagate.
pub fn resolve_probs(
    home_team: &str,
    away_team: &str,
    predictor: &dyn OutcomePredictor,
) -> Result<Prob3> {
    match predictor.predict(home_team, away_team) {
        Ok(p) => Ok(p),
        Err(err) if err.is_fallback_eligible() => {
            warn!(home_team, away_team, error = %err, "predictor unavailable, using fallback distribution");
            Ok(FALLBACK_PROBS)
        }
        Err(err) => Err(err),
    }
}

pub fn simulate_match_outcome<R: Rng + ?Sized>(
    home_team: &str,
    away_team: &str,
    predictor: &dyn OutcomePredictor,
    rng: &mut R,
) -> Result<Outcome> {
    let probs = resolve_probs(home_team, away_team, predictor)?;
    sample_outcome(probs, rng)
}

/// Samples a fixture `samples` times and returns the observed frequencies.
pub fn simulate_match_distribution<R: Rng + ?Sized>(
    home_team: &str,
    away_team: &str,
    predictor: &dyn OutcomePredictor,
    samples: usize,
    rng: &mut R,
) -> Result<Prob3> {
    if samples == 0 {
        return Err(ForecastError::InvalidConfig(
            "match simulation needs at least one sample".to_string(),
        ));
    }
    let probs = resolve_probs(home_team, away_team, predictor)?;
    let mut counts = [0usize; 3];
    for _ in 0..samples {
        let outcome = sample_outcome(probs, rng)?;
        counts[outcome.target() as usize] += 1;
    }
    let n = samples as f64;
    Ok(Prob3 {
        home: counts[0] as f64 / n,
        draw: counts[1] as f64 / n,
        away: counts[2] as f64 / n,
    })
}
