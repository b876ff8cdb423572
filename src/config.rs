use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::elo::EloConfig;
use crate::features::FeatureConfig;
use crate::form::FormConfig;
use crate::predictor::EloPredictorConfig;
use crate::season::SeasonConfig;

/// Runtime settings read from the environment (after `.env.local` / `.env`).
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub current_season: String,
    pub elo_k: f64,
    pub elo_base: f64,
    pub home_adv_pts: f64,
    pub form_window: usize,
    pub rollouts: usize,
    pub max_rollouts: usize,
    pub seed: Option<u64>,
    pub match_samples: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/epl_matches.sqlite"),
            current_season: "2324".to_string(),
            elo_k: 20.0,
            elo_base: 1500.0,
            home_adv_pts: 60.0,
            form_window: 5,
            rollouts: 100,
            max_rollouts: 500,
            seed: None,
            match_samples: 100,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Settings::default();
        Self {
            db_path: lookup("EPL_DB_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(d.db_path),
            current_season: lookup("EPL_CURRENT_SEASON")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.current_season),
            elo_k: parse_or(&lookup, "EPL_ELO_K", d.elo_k),
            elo_base: parse_or(&lookup, "EPL_ELO_BASE", d.elo_base),
            home_adv_pts: parse_or(&lookup, "EPL_HOME_ADV_PTS", d.home_adv_pts),
            form_window: parse_or(&lookup, "EPL_FORM_WINDOW", d.form_window).max(1),
            rollouts: parse_or(&lookup, "EPL_SIM_ROLLOUTS", d.rollouts).max(1),
            max_rollouts: parse_or(&lookup, "EPL_SIM_MAX_ROLLOUTS", d.max_rollouts).max(1),
            seed: lookup("EPL_SIM_SEED").and_then(|raw| parse_value("EPL_SIM_SEED", &raw)),
            match_samples: parse_or(&lookup, "EPL_MATCH_SAMPLES", d.match_samples).max(1),
        }
    }

    pub fn elo(&self) -> EloConfig {
        EloConfig {
            k: self.elo_k,
            base_rating: self.elo_base,
        }
    }

    pub fn features(&self) -> FeatureConfig {
        FeatureConfig {
            elo: self.elo(),
            form: FormConfig {
                window: self.form_window,
            },
        }
    }

    pub fn predictor(&self) -> EloPredictorConfig {
        EloPredictorConfig {
            elo: self.elo(),
            home_adv_pts: self.home_adv_pts,
        }
    }

    pub fn season(&self, rollouts: usize, seed: Option<u64>) -> SeasonConfig {
        SeasonConfig {
            rollouts,
            seed: seed.or(self.seed),
            parallel: true,
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|raw| parse_value(key, &raw))
        .unwrap_or(default)
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]);
        assert_eq!(s.elo_k, 20.0);
        assert_eq!(s.form_window, 5);
        assert_eq!(s.current_season, "2324");
        assert!(s.seed.is_none());
    }

    #[test]
    fn overrides_and_bad_values() {
        let s = settings(&[
            ("EPL_ELO_K", "32"),
            ("EPL_FORM_WINDOW", "0"),
            ("EPL_SIM_ROLLOUTS", "lots"),
            ("EPL_SIM_SEED", "7"),
            ("EPL_CURRENT_SEASON", " 2425 "),
        ]);
        assert_eq!(s.elo_k, 32.0);
        assert_eq!(s.form_window, 1);
        assert_eq!(s.rollouts, 100);
        assert_eq!(s.seed, Some(7));
        assert_eq!(s.current_season, "2425");
        assert_eq!(s.season(10, None).seed, Some(7));
        assert_eq!(s.season(10, Some(1)).seed, Some(1));
    }
}
