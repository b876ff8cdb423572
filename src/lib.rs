pub mod cli;
pub mod config;
pub mod elo;
pub mod error;
pub mod features;
pub mod form;
pub mod history;
pub mod matches;
pub mod metrics;
pub mod outcome;
pub mod predictor;
pub mod season;

pub use error::{ForecastError, Result};
pub use matches::MatchRecord;
pub use outcome::{Outcome, OutcomePredictor, Prob3};
