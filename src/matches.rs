use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::outcome::Outcome;

/// One row of match history. Fixtures that have not been played carry `None` goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: Option<u8>,
    pub away_goals: Option<u8>,
    pub result: Option<Outcome>,
    pub source: String,
}

impl MatchRecord {
    pub fn completed(
        date: NaiveDate,
        home_team: &str,
        away_team: &str,
        home_goals: u8,
        away_goals: u8,
        source: &str,
    ) -> Self {
        Self {
            date,
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_goals: Some(home_goals),
            away_goals: Some(away_goals),
            result: Some(Outcome::from_goals(home_goals, away_goals)),
            source: source.to_string(),
        }
    }

    pub fn fixture(date: NaiveDate, home_team: &str, away_team: &str, source: &str) -> Self {
        Self {
            date,
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_goals: None,
            away_goals: None,
            result: None,
            source: source.to_string(),
        }
    }

    pub fn goals(&self) -> Option<(u8, u8)> {
        match (self.home_goals, self.away_goals) {
            (Some(h), Some(a)) => Some((h, a)),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.goals().is_some()
    }

    /// Recorded full-time result, or the one implied by the score when the
    /// source row left FTR blank.
    pub fn full_time_result(&self) -> Option<Outcome> {
        self.result
            .or_else(|| self.goals().map(|(h, a)| Outcome::from_goals(h, a)))
    }

    /// Score of a completed match, failing with the position of the offending row.
    pub fn require_goals(&self, index: usize) -> Result<(u8, u8)> {
        let home = self.home_goals.ok_or(ForecastError::MissingField {
            index,
            field: "home_goals",
        })?;
        let away = self.away_goals.ok_or(ForecastError::MissingField {
            index,
            field: "away_goals",
        })?;
        Ok((home, away))
    }

    pub fn validate(&self, index: usize) -> Result<()> {
        if self.home_team.trim().is_empty() {
            return Err(ForecastError::MissingField {
                index,
                field: "home_team",
            });
        }
        if self.away_team.trim().is_empty() {
            return Err(ForecastError::MissingField {
                index,
                field: "away_team",
            });
        }
        if self.home_team == self.away_team {
            return Err(ForecastError::InvalidField {
                index,
                field: "away_team",
                value: self.away_team.clone(),
            });
        }
        Ok(())
    }
}

/// Stable sort by date. Matches sharing a date keep their input order, which is
/// also the order ratings are updated in.
pub fn sort_chronological(matches: &mut [MatchRecord]) {
    matches.sort_by(|a, b| a.date.cmp(&b.date));
}

/// Fails on the first match dated before its predecessor.
pub fn ensure_chronological(matches: &[MatchRecord]) -> Result<()> {
    for (idx, pair) in matches.windows(2).enumerate() {
        if pair[1].date < pair[0].date {
            return Err(ForecastError::OutOfOrder {
                index: idx + 1,
                date: pair[1].date,
                previous: pair[0].date,
            });
        }
    }
    Ok(())
}

pub fn completed_matches(matches: &[MatchRecord]) -> Vec<MatchRecord> {
    matches.iter().filter(|m| m.is_completed()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 8, d).unwrap()
    }

    #[test]
    fn full_time_result_falls_back_to_score() {
        let mut m = MatchRecord::completed(day(1), "Arsenal", "Chelsea", 2, 2, "2324_E0");
        m.result = None;
        assert_eq!(m.full_time_result(), Some(Outcome::Draw));

        let f = MatchRecord::fixture(day(2), "Arsenal", "Chelsea", "2324_E0");
        assert_eq!(f.full_time_result(), None);
        assert!(!f.is_completed());
    }

    #[test]
    fn sort_keeps_input_order_on_same_date() {
        let mut rows = vec![
            MatchRecord::completed(day(5), "A", "B", 1, 0, "s"),
            MatchRecord::completed(day(1), "C", "D", 1, 0, "s"),
            MatchRecord::completed(day(5), "E", "F", 1, 0, "s"),
            MatchRecord::completed(day(1), "G", "H", 1, 0, "s"),
        ];
        sort_chronological(&mut rows);
        let order: Vec<&str> = rows.iter().map(|m| m.home_team.as_str()).collect();
        assert_eq!(order, vec!["C", "G", "A", "E"]);
        assert!(ensure_chronological(&rows).is_ok());
    }

    #[test]
    fn out_of_order_is_reported_with_index() {
        let rows = vec![
            MatchRecord::completed(day(5), "A", "B", 1, 0, "s"),
            MatchRecord::completed(day(1), "C", "D", 1, 0, "s"),
        ];
        let err = ensure_chronological(&rows).unwrap_err();
        assert!(matches!(err, ForecastError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn validate_rejects_blank_team() {
        let m = MatchRecord::fixture(day(1), " ", "Chelsea", "s");
        assert!(matches!(
            m.validate(3),
            Err(ForecastError::MissingField {
                index: 3,
                field: "home_team"
            })
        ));
    }
}
