use std::path::PathBuf;

use chrono::NaiveDate;
use rusqlite::Connection;

use epl_predictor::history::{self, CsvHistory, MatchHistory};
use epl_predictor::season;
use epl_predictor::{ForecastError, Outcome};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn reads_football_data_csv() {
    let rows = history::read_csv(&fixture("2324_E0.csv"), None).unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|m| m.source == "2324_E0"));

    let first = &rows[0];
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 8, 11).unwrap());
    assert_eq!(first.home_team, "Burnley");
    assert_eq!(first.goals(), Some((0, 3)));
    assert_eq!(first.result, Some(Outcome::Away));
    assert_eq!(rows[1].away_team, "Nott'm Forest");

    let pending: Vec<_> = rows.iter().filter(|m| !m.is_completed()).collect();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|m| m.result.is_none()));
}

#[test]
fn two_digit_years_float_goals_and_blank_lines() {
    let rows = history::read_csv(&fixture("2223_E0.csv"), None).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2022, 8, 5).unwrap());
    let leeds = &rows[2];
    assert_eq!(leeds.goals(), Some((2, 1)));
    assert_eq!(leeds.result, None);
    assert_eq!(leeds.full_time_result(), Some(Outcome::Home));
}

#[test]
fn bad_date_reports_row() {
    let data = "Date,HomeTeam,AwayTeam,FTHG,FTAG,FTR\n01/08/2023,A,B,1,0,H\n2023-08-02,B,A,0,0,D\n";
    let err = history::parse_csv(data.as_bytes(), "x").unwrap_err();
    assert!(matches!(err, ForecastError::InvalidField { index: 2, field: "Date", .. }));
}

#[test]
fn csv_history_merges_files_in_date_order() {
    let source = CsvHistory {
        files: vec![fixture("2324_E0.csv"), fixture("2223_E0.csv")],
    };
    let rows = source.load_matches().unwrap();
    assert_eq!(rows.len(), 10);
    assert!(rows.windows(2).all(|w| w[0].date <= w[1].date));
    assert_eq!(rows[0].source, "2223_E0");

    let part = season::partition_season(&rows, "2324");
    assert_eq!(part.completed.len(), 4);
    assert_eq!(part.fixtures.len(), 2);
    assert_eq!(part.teams.len(), 8);
}

#[test]
fn sqlite_store_upserts_and_preserves_order() {
    let mut conn = Connection::open_in_memory().unwrap();
    history::init_schema(&conn).unwrap();

    let mut rows = history::read_csv(&fixture("2324_E0.csv"), None).unwrap();
    history::upsert_matches(&mut conn, &rows).unwrap();

    // Re-ingesting with scores filled in updates instead of duplicating.
    rows[4].home_goals = Some(1);
    rows[4].away_goals = Some(1);
    rows[4].result = Some(Outcome::Draw);
    history::upsert_matches(&mut conn, &rows).unwrap();

    let loaded = history::load_matches(&conn).unwrap();
    assert_eq!(loaded.len(), 6);
    assert_eq!(loaded, rows);
}
