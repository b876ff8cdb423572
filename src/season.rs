//! Monte Carlo projection of the current season's final table.
//!
//! Completed matches are applied as played; every remaining fixture is sampled
//! once per rollout. Rollouts share nothing mutable, so they can run on rayon
//! with one seeded RNG each and still reproduce the sequential result.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ForecastError, Result};
use crate::matches::{MatchRecord, sort_chronological};
use crate::outcome::{Outcome, OutcomePredictor, Prob3, resolve_probs, sample_outcome};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeasonConfig {
    pub rollouts: usize,
    /// Base seed; rollout `i` uses `seed + i`. Random when unset.
    pub seed: Option<u64>,
    pub parallel: bool,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            rollouts: 100,
            seed: None,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeamRecord {
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: u32,
}

impl TeamRecord {
    pub fn goal_difference(&self) -> i64 {
        self.goals_for as i64 - self.goals_against as i64
    }

    fn record(&mut self, points: u32, goals: Option<(u8, u8)>) {
        self.played += 1;
        self.points += points;
        match points {
            3 => self.wins += 1,
            1 => self.draws += 1,
            _ => self.losses += 1,
        }
        if let Some((gf, ga)) = goals {
            self.goals_for += gf as u32;
            self.goals_against += ga as u32;
        }
    }
}

/// League table for one rollout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Standings {
    records: BTreeMap<String, TeamRecord>,
}

impl Standings {
    pub fn new<'a>(teams: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            records: teams
                .into_iter()
                .map(|t| (t.to_string(), TeamRecord::default()))
                .collect(),
        }
    }

    pub fn get(&self, team: &str) -> Option<&TeamRecord> {
        self.records.get(team)
    }

    /// Credits both sides. `goals` is `None` for sampled outcomes, which move
    /// points only.
    pub fn apply(
        &mut self,
        home_team: &str,
        away_team: &str,
        outcome: Outcome,
        goals: Option<(u8, u8)>,
    ) -> Result<()> {
        let (home_pts, away_pts) = outcome.points();
        self.entry(home_team)?.record(home_pts, goals);
        self.entry(away_team)?
            .record(away_pts, goals.map(|(h, a)| (a, h)));
        Ok(())
    }

    fn entry(&mut self, team: &str) -> Result<&mut TeamRecord> {
        self.records
            .get_mut(team)
            .ok_or_else(|| ForecastError::UnknownTeam {
                team: team.to_string(),
            })
    }

    /// Points descending, then goal difference descending, then team name.
    pub fn ranked(&self) -> Vec<(&str, &TeamRecord)> {
        let mut rows: Vec<(&str, &TeamRecord)> =
            self.records.iter().map(|(t, r)| (t.as_str(), r)).collect();
        rows.sort_by(|a, b| compare_rows(a, b));
        rows
    }
}

fn compare_rows(a: &(&str, &TeamRecord), b: &(&str, &TeamRecord)) -> Ordering {
    b.1.points
        .cmp(&a.1.points)
        .then(b.1.goal_difference().cmp(&a.1.goal_difference()))
        .then(a.0.cmp(b.0))
}

/// Current-season matches split into played and still-to-play.
#[derive(Debug, Clone, Default)]
pub struct SeasonPartition {
    /// Every team appearing in the season, sorted.
    pub teams: Vec<String>,
    pub completed: Vec<MatchRecord>,
    pub fixtures: Vec<MatchRecord>,
}

/// Selects matches whose source tag contains `season_tag` and splits them by
/// whether both scores are present. Order within each half is chronological.
pub fn partition_season(matches: &[MatchRecord], season_tag: &str) -> SeasonPartition {
    let mut season: Vec<MatchRecord> = matches
        .iter()
        .filter(|m| m.source.contains(season_tag))
        .cloned()
        .collect();
    sort_chronological(&mut season);

    let teams: BTreeSet<&str> = season
        .iter()
        .flat_map(|m| [m.home_team.as_str(), m.away_team.as_str()])
        .collect();
    let teams = teams.into_iter().map(str::to_string).collect();

    let (completed, fixtures): (Vec<MatchRecord>, Vec<MatchRecord>) =
        season.into_iter().partition(|m| m.is_completed());
    SeasonPartition {
        teams,
        completed,
        fixtures,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamProjection {
    pub team: String,
    pub average_final_rank: f64,
    pub rollout_count: usize,
    pub best_rank: usize,
    pub worst_rank: usize,
    /// `position_counts[p]` = rollouts finishing in position `p + 1`.
    pub position_counts: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "table", rename_all = "snake_case")]
pub enum SeasonProjection {
    /// No fixtures left to simulate.
    SeasonComplete,
    Projected(Vec<TeamProjection>),
}

/// Fails with `InvalidConfig` when no match carries `season_tag`, so a
/// mistyped tag is not reported as a finished season.
pub fn simulate_season(
    matches: &[MatchRecord],
    season_tag: &str,
    predictor: &dyn OutcomePredictor,
    cfg: &SeasonConfig,
) -> Result<SeasonProjection> {
    let partition = partition_season(matches, season_tag);
    if partition.teams.is_empty() {
        return Err(ForecastError::InvalidConfig(format!(
            "no matches tagged with season `{season_tag}`"
        )));
    }
    simulate_partition(&partition, predictor, cfg)
}

/// `partition.teams` may come in any order; it is sorted and deduplicated here.
pub fn simulate_partition(
    partition: &SeasonPartition,
    predictor: &dyn OutcomePredictor,
    cfg: &SeasonConfig,
) -> Result<SeasonProjection> {
    if partition.fixtures.is_empty() {
        info!(
            completed = partition.completed.len(),
            "season complete, nothing to simulate"
        );
        return Ok(SeasonProjection::SeasonComplete);
    }
    if cfg.rollouts == 0 {
        return Err(ForecastError::InvalidConfig(
            "season simulation needs at least one rollout".to_string(),
        ));
    }

    let teams: Vec<String> = partition
        .teams
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let slots: HashMap<&str, usize> = teams
        .iter()
        .enumerate()
        .map(|(idx, team)| (team.as_str(), idx))
        .collect();
    let base = base_standings(&teams, &partition.completed)?;

    // The predictor only sees team names, so each fixture is priced once.
    let priced = partition
        .fixtures
        .iter()
        .map(|f| {
            let probs = resolve_probs(&f.home_team, &f.away_team, predictor)?;
            probs.normalized()?;
            Ok((f.home_team.as_str(), f.away_team.as_str(), probs))
        })
        .collect::<Result<Vec<_>>>()?;

    let seed = cfg.seed.unwrap_or_else(rand::random);
    let run = |i: usize| run_rollout(&base, &priced, &slots, seed.wrapping_add(i as u64));
    let positions: Vec<Vec<usize>> = if cfg.parallel {
        (0..cfg.rollouts).into_par_iter().map(run).collect::<Result<_>>()?
    } else {
        (0..cfg.rollouts).map(run).collect::<Result<_>>()?
    };

    info!(
        teams = teams.len(),
        completed = partition.completed.len(),
        fixtures = priced.len(),
        rollouts = cfg.rollouts,
        "season simulation finished"
    );

    Ok(SeasonProjection::Projected(aggregate(&teams, &positions)))
}

fn base_standings(teams: &[String], completed: &[MatchRecord]) -> Result<Standings> {
    let mut table = Standings::new(teams.iter().map(String::as_str));
    for (idx, m) in completed.iter().enumerate() {
        let goals = m.require_goals(idx)?;
        let outcome = m.full_time_result().ok_or_else(|| ForecastError::MissingResult {
            index: idx,
            home: m.home_team.clone(),
            away: m.away_team.clone(),
        })?;
        table.apply(&m.home_team, &m.away_team, outcome, Some(goals))?;
    }
    Ok(table)
}

/// Finishing position (1-based) of each team, indexed by `slots`.
fn run_rollout(
    base: &Standings,
    fixtures: &[(&str, &str, Prob3)],
    slots: &HashMap<&str, usize>,
    seed: u64,
) -> Result<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut table = base.clone();
    for (home, away, probs) in fixtures {
        let outcome = sample_outcome(*probs, &mut rng)?;
        table.apply(home, away, outcome, None)?;
    }

    let ranked = table.ranked();
    let mut positions = vec![0usize; slots.len()];
    for (pos, (team, _)) in ranked.iter().enumerate() {
        let idx = slots.get(team).ok_or_else(|| ForecastError::UnknownTeam {
            team: team.to_string(),
        })?;
        positions[*idx] = pos + 1;
    }
    debug!(seed, leader = ?ranked.first().map(|r| r.0), "rollout done");
    Ok(positions)
}

fn aggregate(teams: &[String], rollouts: &[Vec<usize>]) -> Vec<TeamProjection> {
    let n = rollouts.len();
    let mut out: Vec<TeamProjection> = teams
        .iter()
        .enumerate()
        .map(|(idx, team)| {
            let mut counts = vec![0u32; teams.len()];
            let mut sum = 0usize;
            let mut best = usize::MAX;
            let mut worst = 0usize;
            for positions in rollouts {
                let p = positions[idx];
                sum += p;
                best = best.min(p);
                worst = worst.max(p);
                counts[p - 1] += 1;
            }
            TeamProjection {
                team: team.clone(),
                average_final_rank: sum as f64 / n as f64,
                rollout_count: n,
                best_rank: best,
                worst_rank: worst,
                position_counts: counts,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        a.average_final_rank
            .total_cmp(&b.average_final_rank)
            .then_with(|| a.team.cmp(&b.team))
    });
    out
}
