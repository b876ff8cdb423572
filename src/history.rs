//! Match history: football-data.co.uk CSV files and the local SQLite store.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::error::{ForecastError, Result};
use crate::matches::{MatchRecord, sort_chronological};
use crate::outcome::Outcome;

/// Supplies the full match sequence, fixtures included. Repeated calls must
/// return matches sharing a date in the same order.
pub trait MatchHistory {
    fn load_matches(&self) -> Result<Vec<MatchRecord>>;
}

/// Reads one or more CSV files; the source tag of each comes from its file stem.
#[derive(Debug, Clone)]
pub struct CsvHistory {
    pub files: Vec<PathBuf>,
}

impl MatchHistory for CsvHistory {
    fn load_matches(&self) -> Result<Vec<MatchRecord>> {
        let mut all = Vec::new();
        for path in &self.files {
            all.extend(read_csv(path, None)?);
        }
        sort_chronological(&mut all);
        Ok(all)
    }
}

#[derive(Debug, Clone)]
pub struct SqliteHistory {
    pub db_path: PathBuf,
}

impl MatchHistory for SqliteHistory {
    fn load_matches(&self) -> Result<Vec<MatchRecord>> {
        let conn = open_db(&self.db_path)?;
        load_matches(&conn)
    }
}

/// `data/2324_E0.csv` -> `2324_E0`.
pub fn source_tag_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// football-data writes `dd/mm/yyyy`, older seasons `dd/mm/yy`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let year = raw.rsplit('/').next()?;
    let fmt = if year.len() == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(raw, fmt).ok()
}

pub fn read_csv(path: &Path, source: Option<&str>) -> Result<Vec<MatchRecord>> {
    let file = std::fs::File::open(path)?;
    let tag = source
        .map(str::to_string)
        .unwrap_or_else(|| source_tag_from_path(path));
    let rows = parse_csv(file, &tag)?;
    debug!(path = %path.display(), rows = rows.len(), "csv parsed");
    Ok(rows)
}

struct Columns {
    date: usize,
    home: usize,
    away: usize,
    home_goals: usize,
    away_goals: usize,
    result: Option<usize>,
}

/// Parses football-data match rows. Blank lines are skipped; a row without a
/// date or team fails the whole import; blank goals mark an unplayed fixture.
/// Row indices in errors are 1-based data rows.
pub fn parse_csv<R: Read>(reader: R, source: &str) -> Result<Vec<MatchRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Files are Latin-1 in places, so headers and cells go through lossy UTF-8.
    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim_start_matches('\u{feff}').to_string())
        .collect();
    let find = |name: &'static str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(ForecastError::MissingField { index: 0, field: name })
    };
    let cols = Columns {
        date: find("Date")?,
        home: find("HomeTeam")?,
        away: find("AwayTeam")?,
        home_goals: find("FTHG")?,
        away_goals: find("FTAG")?,
        result: find("FTR").ok(),
    };

    let mut out = Vec::new();
    for (i, record) in rdr.byte_records().enumerate() {
        let record = record?;
        let index = i + 1;
        let cell = |idx: usize| -> String {
            record
                .get(idx)
                .map(|b| String::from_utf8_lossy(b).trim().to_string())
                .unwrap_or_default()
        };

        if record.iter().all(|b| b.iter().all(u8::is_ascii_whitespace)) {
            continue;
        }

        let raw_date = cell(cols.date);
        if raw_date.is_empty() {
            return Err(ForecastError::MissingField { index, field: "Date" });
        }
        let date = parse_date(&raw_date).ok_or(ForecastError::InvalidField {
            index,
            field: "Date",
            value: raw_date.clone(),
        })?;

        let home_team = cell(cols.home);
        if home_team.is_empty() {
            return Err(ForecastError::MissingField { index, field: "HomeTeam" });
        }
        let away_team = cell(cols.away);
        if away_team.is_empty() {
            return Err(ForecastError::MissingField { index, field: "AwayTeam" });
        }

        let home_goals = parse_goals(&cell(cols.home_goals), index, "FTHG")?;
        let away_goals = parse_goals(&cell(cols.away_goals), index, "FTAG")?;

        let result = match cols.result.map(&cell).filter(|s| !s.is_empty()) {
            None => None,
            Some(code) => Some(Outcome::from_code(&code).ok_or(ForecastError::InvalidField {
                index,
                field: "FTR",
                value: code.clone(),
            })?),
        };

        out.push(MatchRecord {
            date,
            home_team,
            away_team,
            home_goals,
            away_goals,
            result,
            source: source.to_string(),
        });
    }

    Ok(out)
}

fn parse_goals(raw: &str, index: usize, field: &'static str) -> Result<Option<u8>> {
    if raw.is_empty() {
        return Ok(None);
    }
    // Some exports write goals as floats ("2.0").
    let value = raw
        .parse::<u8>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && (0.0..=255.0).contains(v))
                .map(|v| v as u8)
        })
        .ok_or_else(|| ForecastError::InvalidField {
            index,
            field,
            value: raw.to_string(),
        })?;
    Ok(Some(value))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            match_date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            result TEXT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (source, match_date, home_team, away_team)
        );
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date);
        CREATE INDEX IF NOT EXISTS idx_matches_source ON matches(source);
        "#,
    )?;
    Ok(())
}

/// Inserts new matches and refreshes scores of known ones. A fixture that later
/// gets a score keeps its original sequence number, so same-day order holds.
pub fn upsert_matches(conn: &mut Connection, matches: &[MatchRecord]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO matches (source, match_date, home_team, away_team, home_goals, away_goals, result, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (source, match_date, home_team, away_team) DO UPDATE SET
                home_goals = excluded.home_goals,
                away_goals = excluded.away_goals,
                result = excluded.result,
                updated_at = excluded.updated_at
            "#,
        )?;
        for m in matches {
            stmt.execute(params![
                m.source,
                m.date.format("%Y-%m-%d").to_string(),
                m.home_team,
                m.away_team,
                m.home_goals,
                m.away_goals,
                m.result.map(Outcome::code),
                now,
            ])?;
        }
    }
    tx.commit()?;
    info!(rows = matches.len(), "matches upserted");
    Ok(matches.len())
}

/// All stored matches ordered by date, then insertion order.
pub fn load_matches(conn: &Connection) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT source, match_date, home_team, away_team, home_goals, away_goals, result
        FROM matches
        ORDER BY match_date ASC, seq ASC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<u8>>(4)?,
            row.get::<_, Option<u8>>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for (idx, row) in rows.enumerate() {
        let (source, raw_date, home_team, away_team, home_goals, away_goals, result) = row?;
        let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|_| {
            ForecastError::InvalidField {
                index: idx,
                field: "match_date",
                value: raw_date.clone(),
            }
        })?;
        let result = match result.filter(|code| !code.trim().is_empty()) {
            None => None,
            Some(code) => Some(Outcome::from_code(&code).ok_or_else(|| {
                ForecastError::InvalidField {
                    index: idx,
                    field: "result",
                    value: code.clone(),
                }
            })?),
        };
        out.push(MatchRecord {
            date,
            home_team,
            away_team,
            home_goals,
            away_goals,
            result,
            source,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Div,Date,Time,HomeTeam,AwayTeam,FTHG,FTAG,FTR,HTHG\n\
E0,11/08/2023,20:00,Burnley,Man City,0,3,A,0\n\
E0,12/08/2023,12:30,Arsenal,Nott'm Forest,2,1,H,2\n\
,,,,,,,,\n\
E0,19/05/2024,16:00,Arsenal,Everton,,,,\n";

    #[test]
    fn parses_completed_rows_and_fixtures() {
        let rows = parse_csv(SAMPLE.as_bytes(), "2324_E0").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2023, 8, 11).unwrap());
        assert_eq!(rows[0].result, Some(Outcome::Away));
        assert_eq!(rows[1].goals(), Some((2, 1)));
        assert!(!rows[2].is_completed());
        assert_eq!(rows[2].source, "2324_E0");
    }

    #[test]
    fn two_digit_years() {
        assert_eq!(parse_date("14/08/21"), NaiveDate::from_ymd_opt(2021, 8, 14));
        assert_eq!(parse_date("14/08/2021"), NaiveDate::from_ymd_opt(2021, 8, 14));
        assert_eq!(parse_date("2021-08-14"), None);
    }

    #[test]
    fn missing_team_rejects_import() {
        let raw = "Date,HomeTeam,AwayTeam,FTHG,FTAG,FTR\n11/08/2023,Burnley,,0,3,A\n";
        let err = parse_csv(raw.as_bytes(), "s").unwrap_err();
        assert!(matches!(
            err,
            ForecastError::MissingField {
                index: 1,
                field: "AwayTeam"
            }
        ));
    }

    #[test]
    fn missing_column_rejects_import() {
        let raw = "Date,HomeTeam,AwayTeam,FTHG\n11/08/2023,Burnley,Luton,0\n";
        let err = parse_csv(raw.as_bytes(), "s").unwrap_err();
        assert!(matches!(err, ForecastError::MissingField { field: "FTAG", .. }));
    }

    #[test]
    fn bad_result_code_is_invalid() {
        let raw = "Date,HomeTeam,AwayTeam,FTHG,FTAG,FTR\n11/08/2023,Burnley,Luton,0,3,X\n";
        assert!(matches!(
            parse_csv(raw.as_bytes(), "s"),
            Err(ForecastError::InvalidField { field: "FTR", .. })
        ));
    }

    #[test]
    fn float_goals_are_accepted() {
        assert_eq!(parse_goals("2.0", 1, "FTHG").unwrap(), Some(2));
        assert!(parse_goals("2.5", 1, "FTHG").is_err());
        assert_eq!(parse_goals("", 1, "FTHG").unwrap(), None);
    }

    #[test]
    fn sqlite_round_trip_keeps_same_day_order_and_updates_scores() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let d = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        let first = vec![
            MatchRecord::fixture(d, "Luton", "Newcastle", "2324_E0"),
            MatchRecord::completed(d, "Arsenal", "Brentford", 2, 1, "2324_E0"),
        ];
        upsert_matches(&mut conn, &first).unwrap();

        let played = vec![MatchRecord::completed(d, "Luton", "Newcastle", 4, 4, "2324_E0")];
        upsert_matches(&mut conn, &played).unwrap();

        let rows = load_matches(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].home_team, "Luton");
        assert_eq!(rows[0].goals(), Some((4, 4)));
        assert_eq!(rows[0].result, Some(Outcome::Draw));
        assert_eq!(rows[1].home_team, "Arsenal");
    }

    #[test]
    fn stored_result_code_must_be_known() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO matches (source, match_date, home_team, away_team, home_goals, away_goals, result, updated_at)
             VALUES ('2324_E0', '2023-08-11', 'Burnley', 'Man City', 0, 3, 'X', '2023-08-12T00:00:00Z')",
            [],
        )
        .unwrap();

        let err = load_matches(&conn).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InvalidField {
                index: 0,
                field: "result",
                ..
            }
        ));
    }
}
