use chrono::NaiveDate;
use thiserror::Error;

/// Failures surfaced by the rating, form, feature and simulation passes.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("match {index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("match {index}: invalid value {value:?} for `{field}`")]
    InvalidField {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("match {index}: dated {date} but follows a match on {previous}")]
    OutOfOrder {
        index: usize,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("match {index} ({home} vs {away}): no resolvable full-time result")]
    MissingResult {
        index: usize,
        home: String,
        away: String,
    },

    #[error("team not found in history: {team}")]
    UnknownTeam { team: String },

    #[error("degenerate outcome distribution: home={home} draw={draw} away={away}")]
    DegenerateDistribution { home: f64, draw: f64, away: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForecastError {
    /// Lookup failures may be replaced by the fallback distribution during season
    /// simulation. Everything else aborts the operation.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, ForecastError::UnknownTeam { .. })
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
