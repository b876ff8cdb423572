//! Trailing-window form per team.
//!
//! Each team's appearances (home and away) are collected into an ordered log,
//! averaged over the previous `window` entries, then looked up again by match
//! position. A match never contributes to its own form value.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::matches::{MatchRecord, ensure_chronological};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FormConfig {
    pub window: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

/// Mean points, goals for and goals against over the trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FormStats {
    pub points: f64,
    pub goals_for: f64,
    pub goals_against: f64,
}

/// One appearance in a team's log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogEntry {
    pub match_index: usize,
    pub is_home: bool,
    pub points: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MatchForm {
    pub home: FormStats,
    pub away: FormStats,
}

/// Per-team logs in match order. Input must already be chronological; a team
/// playing twice on one date keeps the input order, same as the rating pass.
pub fn build_team_logs(matches: &[MatchRecord]) -> Result<BTreeMap<String, Vec<LogEntry>>> {
    let mut logs: BTreeMap<String, Vec<LogEntry>> = BTreeMap::new();

    for (idx, m) in matches.iter().enumerate() {
        m.validate(idx)?;
        let (hg, ag) = m.require_goals(idx)?;
        let result = m.full_time_result().ok_or_else(|| ForecastError::MissingResult {
            index: idx,
            home: m.home_team.clone(),
            away: m.away_team.clone(),
        })?;
        let (home_pts, away_pts) = result.points();

        logs.entry(m.home_team.clone()).or_default().push(LogEntry {
            match_index: idx,
            is_home: true,
            points: home_pts,
            goals_for: hg as u32,
            goals_against: ag as u32,
        });
        logs.entry(m.away_team.clone()).or_default().push(LogEntry {
            match_index: idx,
            is_home: false,
            points: away_pts,
            goals_for: ag as u32,
            goals_against: hg as u32,
        });
    }

    Ok(logs)
}

/// `out[i]` averages `log[i - window..i]` (fewer entries near the start). The
/// first appearance gets zeros.
pub fn trailing_form(log: &[LogEntry], window: usize) -> Vec<FormStats> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(log.len());
    let (mut pts, mut gf, mut ga) = (0u32, 0u32, 0u32);

    for i in 0..log.len() {
        let n = i.min(window);
        if n == 0 {
            out.push(FormStats::default());
        } else {
            let n = n as f64;
            out.push(FormStats {
                points: pts as f64 / n,
                goals_for: gf as f64 / n,
                goals_against: ga as f64 / n,
            });
        }

        pts += log[i].points;
        gf += log[i].goals_for;
        ga += log[i].goals_against;
        if i >= window {
            let old = &log[i - window];
            pts -= old.points;
            gf -= old.goals_for;
            ga -= old.goals_against;
        }
    }

    out
}

/// Pre-match form of both sides for every match, in input order.
pub fn compute_form(matches: &[MatchRecord], cfg: &FormConfig) -> Result<Vec<MatchForm>> {
    ensure_chronological(matches)?;
    let logs = build_team_logs(matches)?;
    let mut out = vec![MatchForm::default(); matches.len()];

    for log in logs.values() {
        for (entry, stats) in log.iter().zip(trailing_form(log, cfg.window)) {
            let slot = &mut out[entry.match_index];
            if entry.is_home {
                slot.home = stats;
            } else {
                slot.away = stats;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn make_match(day: u32, home: &str, away: &str, hg: u8, ag: u8) -> MatchRecord {
        MatchRecord::completed(
            NaiveDate::from_ymd_opt(2023, 10, day).unwrap(),
            home,
            away,
            hg,
            ag,
            "2324_E0",
        )
    }

    fn entry(points: u32, goals_for: u32, goals_against: u32) -> LogEntry {
        LogEntry {
            match_index: 0,
            is_home: true,
            points,
            goals_for,
            goals_against,
        }
    }

    #[test]
    fn first_appearance_is_zero() {
        let form = compute_form(&[make_match(1, "A", "B", 4, 1)], &FormConfig::default()).unwrap();
        assert_eq!(form[0].home, FormStats::default());
        assert_eq!(form[0].away, FormStats::default());
    }

    #[test]
    fn window_is_shifted_by_one() {
        let log = vec![entry(3, 2, 0), entry(0, 0, 1), entry(1, 1, 1), entry(3, 4, 2)];
        let form = trailing_form(&log, 2);

        assert_eq!(form[0], FormStats::default());
        assert_eq!(form[1], FormStats { points: 3.0, goals_for: 2.0, goals_against: 0.0 });
        assert_eq!(form[2], FormStats { points: 1.5, goals_for: 1.0, goals_against: 0.5 });
        // Entry 0 has dropped out of the window.
        assert_eq!(form[3], FormStats { points: 0.5, goals_for: 0.5, goals_against: 1.0 });
    }

    #[test]
    fn own_result_never_leaks() {
        let base = vec![
            make_match(1, "A", "B", 1, 0),
            make_match(2, "B", "C", 2, 2),
            make_match(3, "C", "A", 0, 3),
            make_match(4, "A", "B", 1, 1),
        ];
        let mut altered = base.clone();
        altered[3] = make_match(4, "A", "B", 0, 5);

        let cfg = FormConfig::default();
        let a = compute_form(&base, &cfg).unwrap();
        let b = compute_form(&altered, &cfg).unwrap();
        assert_eq!(a[3], b[3]);
    }

    #[test]
    fn home_and_away_appearances_share_a_log() {
        let rows = vec![
            make_match(1, "A", "B", 2, 0),
            make_match(2, "C", "A", 1, 1),
            make_match(3, "A", "C", 0, 0),
        ];
        let form = compute_form(&rows, &FormConfig::default()).unwrap();
        // A: won 2-0 at home, drew 1-1 away.
        assert_eq!(form[2].home, FormStats { points: 2.0, goals_for: 1.5, goals_against: 0.5 });
        // C: drew 1-1 at home.
        assert_eq!(form[2].away, FormStats { points: 1.0, goals_for: 1.0, goals_against: 1.0 });
    }

    #[test]
    fn same_date_twice_is_ordered_by_input() {
        let rows = vec![make_match(1, "A", "B", 3, 0), make_match(1, "A", "C", 0, 1)];
        let form = compute_form(&rows, &FormConfig::default()).unwrap();
        assert_eq!(form[0].home.points, 0.0);
        assert_eq!(form[1].home.points, 3.0);
    }

    #[test]
    fn zero_window_is_treated_as_one() {
        let log = vec![entry(3, 1, 0), entry(0, 0, 2), entry(1, 1, 1)];
        let form = trailing_form(&log, 0);
        assert_eq!(form[2].points, 0.0);
        assert_eq!(form[2].goals_against, 2.0);
    }
}
