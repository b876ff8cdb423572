use serde::Serialize;

use crate::outcome::{Outcome, Prob3};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

pub fn empirical_outcome_probs(outcomes: &[Outcome]) -> Prob3 {
    if outcomes.is_empty() {
        return Prob3::uniform();
    }

    let mut counts = [0usize; 3];
    for outcome in outcomes {
        counts[outcome.target() as usize] += 1;
    }
    let n = outcomes.len() as f64;
    Prob3 {
        home: counts[0] as f64 / n,
        draw: counts[1] as f64 / n,
        away: counts[2] as f64 / n,
    }
}

/// Mean multi-class Brier score, log loss and argmax accuracy. Mismatched or
/// empty inputs score as zero samples.
pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::default();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let y = one_hot(*outcome);
        brier_sum +=
            (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2);
        log_loss_sum += -p.get(*outcome).clamp(1e-12, 1.0).ln();
        if argmax(*p) == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

pub fn argmax(p: Prob3) -> Outcome {
    if p.home >= p.draw && p.home >= p.away {
        Outcome::Home
    } else if p.away >= p.draw {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

fn one_hot(outcome: Outcome) -> Prob3 {
    match outcome {
        Outcome::Home => Prob3::new(1.0, 0.0, 0.0),
        Outcome::Draw => Prob3::new(0.0, 1.0, 0.0),
        Outcome::Away => Prob3::new(0.0, 0.0, 1.0),
    }
}
