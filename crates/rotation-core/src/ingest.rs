// Game log and roster CSV loading.
//
// Accepts both snake_case headers and the upper-case column names used by
// the common box-score exports (PLAYER_ID, GAME_DATE, MIN, PTS, ...).

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::model::{GameLogRecord, RosterEntry};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// Unknown columns are ignored by the header-driven deserializer.
#[derive(Debug, Deserialize)]
struct RawGameLog {
    #[serde(alias = "PLAYER_ID", alias = "playerId")]
    player_id: i64,
    #[serde(alias = "PLAYER_NAME", alias = "playerName")]
    player_name: String,
    #[serde(alias = "SEASON", alias = "SEASON_YEAR")]
    season: String,
    #[serde(alias = "TEAM_ID", alias = "teamId")]
    team_id: String,
    #[serde(default, alias = "TEAM_ABBREVIATION", alias = "teamTricode")]
    team_tricode: String,
    #[serde(default, alias = "POSITION")]
    position: String,
    #[serde(alias = "GAME_DATE", alias = "gameDate")]
    game_date: String,
    #[serde(default, alias = "MIN")]
    minutes: Option<f64>,
    #[serde(default, alias = "PTS")]
    points: Option<f64>,
    #[serde(default, alias = "AST")]
    assists: Option<f64>,
    #[serde(default, alias = "REB")]
    rebounds: Option<f64>,
    #[serde(default, alias = "STL")]
    steals: Option<f64>,
    #[serde(default, alias = "BLK")]
    blocks: Option<f64>,
    #[serde(default, alias = "TOV")]
    turnovers: Option<f64>,
    #[serde(default, alias = "FG_PCT", alias = "fgPct")]
    fg_pct: Option<f64>,
    #[serde(default, alias = "FG3_PCT", alias = "threePct")]
    three_pct: Option<f64>,
    #[serde(default, alias = "FT_PCT", alias = "ftPct")]
    ft_pct: Option<f64>,
    #[serde(default, alias = "PLUS_MINUS", alias = "plusMinus")]
    plus_minus: Option<f64>,
    #[serde(default, alias = "IS_HOME", alias = "isHome")]
    is_home: Option<String>,
    #[serde(default, alias = "IS_BACK_TO_BACK", alias = "isBackToBack")]
    is_back_to_back: Option<String>,
    #[serde(default, alias = "DAYS_REST", alias = "daysRest")]
    days_rest: Option<i64>,
    #[serde(default, alias = "IS_STARTER", alias = "isStarter")]
    is_starter: Option<String>,
    #[serde(default, alias = "PLAYED")]
    played: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRosterEntry {
    #[serde(alias = "TEAM_ID", alias = "teamId")]
    team_id: String,
    #[serde(alias = "SEASON")]
    season: String,
    #[serde(alias = "PLAYER_ID", alias = "playerId")]
    player_id: i64,
    #[serde(default, alias = "PLAYER_NAME", alias = "playerName")]
    player_name: String,
    #[serde(default, alias = "IS_STARTER", alias = "isStarter")]
    is_starter: Option<String>,
    #[serde(default, alias = "IS_INJURED", alias = "isInjured")]
    is_injured: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a loose boolean cell. Blank cells yield `None`.
fn parse_flag(raw: Option<&str>) -> Result<Option<bool>, String> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(Some(true)),
        "false" | "f" | "0" | "no" | "n" => Ok(Some(false)),
        other => Err(format!("unrecognized boolean '{other}'")),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        // Full timestamps as exported by some feeds: keep the date part.
        .or_else(|_| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d"))
        .map_err(|e| format!("invalid game date '{s}': {e}"))
}

/// Counting stat: blank → 0, must be finite and non-negative.
fn counting(name: &str, value: Option<f64>) -> Result<f64, String> {
    let v = value.unwrap_or(0.0);
    if !v.is_finite() || v < 0.0 {
        return Err(format!("{name} must be a non-negative number, got {v}"));
    }
    Ok(v)
}

/// Shooting percentage: blank stays `None`, otherwise must lie in 0-100.
fn percentage(name: &str, value: Option<f64>) -> Result<Option<f64>, String> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && (0.0..=100.0).contains(&v) => Ok(Some(v)),
        Some(v) => Err(format!("{name} must be between 0 and 100, got {v}")),
    }
}

fn convert_game_log(raw: RawGameLog) -> Result<GameLogRecord, String> {
    let game_date = parse_date(&raw.game_date)?;
    let minutes = counting("minutes", raw.minutes)?;

    let days_rest = match raw.days_rest {
        Some(d) if d < 0 => return Err(format!("days_rest must be >= 0, got {d}")),
        Some(d) => Some(u32::try_from(d).map_err(|_| format!("days_rest out of range, got {d}"))?),
        None => None,
    };
    let is_back_to_back = parse_flag(raw.is_back_to_back.as_deref())?;
    // Either column can stand in for the other when one is missing.
    let (days_rest, is_back_to_back) = match (days_rest, is_back_to_back) {
        (Some(d), Some(b)) => (d, b),
        (Some(d), None) => (d, d == 0),
        (None, Some(true)) => (0, true),
        (None, _) => (1, false),
    };

    let plus_minus = raw.plus_minus.unwrap_or(0.0);
    if !plus_minus.is_finite() {
        return Err("plus_minus must be finite".into());
    }

    Ok(GameLogRecord {
        player_id: raw.player_id,
        player_name: raw.player_name.trim().to_string(),
        season: raw.season.trim().to_string(),
        team_id: raw.team_id.trim().to_string(),
        team_tricode: raw.team_tricode.trim().to_string(),
        position: raw.position.trim().to_string(),
        game_date,
        minutes,
        points: counting("points", raw.points)?,
        assists: counting("assists", raw.assists)?,
        rebounds: counting("rebounds", raw.rebounds)?,
        steals: counting("steals", raw.steals)?,
        blocks: counting("blocks", raw.blocks)?,
        turnovers: counting("turnovers", raw.turnovers)?,
        fg_pct: percentage("fg_pct", raw.fg_pct)?,
        three_pct: percentage("three_pct", raw.three_pct)?,
        ft_pct: percentage("ft_pct", raw.ft_pct)?,
        plus_minus,
        is_home: parse_flag(raw.is_home.as_deref())?.unwrap_or(false),
        is_back_to_back,
        days_rest,
        is_starter: parse_flag(raw.is_starter.as_deref())?.unwrap_or(false),
        // Without an explicit flag, a line with no minutes is a DNP.
        played: parse_flag(raw.played.as_deref())?.unwrap_or(minutes > 0.0),
    })
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

/// Read game log rows from any reader. Rows that fail to parse or validate
/// are skipped with a warning; only a broken CSV stream is an error.
pub fn load_game_logs_from_reader<R: Read>(rdr: R) -> Result<Vec<GameLogRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(rdr);
    let mut records = Vec::new();
    for (idx, result) in reader.deserialize::<RawGameLog>().enumerate() {
        let line = idx + 2;
        match result {
            Ok(raw) => {
                let player_id = raw.player_id;
                match convert_game_log(raw) {
                    Ok(record) => records.push(record),
                    Err(reason) => {
                        warn!("skipping game log row {line} (player {player_id}): {reason}");
                    }
                }
            }
            Err(e) => {
                warn!("skipping malformed game log row {line}: {e}");
            }
        }
    }
    Ok(records)
}

pub fn load_roster_from_reader<R: Read>(rdr: R) -> Result<Vec<RosterEntry>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(rdr);
    let mut entries = Vec::new();
    for result in reader.deserialize::<RawRosterEntry>() {
        match result {
            Ok(raw) => {
                let flags = parse_flag(raw.is_starter.as_deref())
                    .and_then(|s| Ok((s, parse_flag(raw.is_injured.as_deref())?)));
                match flags {
                    Ok((is_starter, is_injured)) => entries.push(RosterEntry {
                        team_id: raw.team_id.trim().to_string(),
                        season: raw.season.trim().to_string(),
                        player_id: raw.player_id,
                        player_name: raw.player_name.trim().to_string(),
                        is_starter: is_starter.unwrap_or(false),
                        is_injured: is_injured.unwrap_or(false),
                    }),
                    Err(reason) => {
                        warn!("skipping roster row for player {}: {reason}", raw.player_id);
                    }
                }
            }
            Err(e) => {
                warn!("skipping malformed roster row: {e}");
            }
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load game logs from a CSV file. An input that yields no valid rows is a
/// validation error.
pub fn load_game_logs(path: &Path) -> Result<Vec<GameLogRecord>, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let records = load_game_logs_from_reader(file).map_err(|e| IngestError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if records.is_empty() {
        return Err(IngestError::Validation(format!(
            "{} produced zero valid game log rows",
            path.display()
        )));
    }
    Ok(records)
}

pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let entries = load_roster_from_reader(file).map_err(|e| IngestError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if entries.is_empty() {
        return Err(IngestError::Validation(format!(
            "{} produced zero valid roster rows",
            path.display()
        )));
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "player_id,player_name,season,team_id,team_tricode,position,game_date,minutes,points,assists,rebounds,steals,blocks,turnovers,fg_pct,three_pct,ft_pct,plus_minus,is_home,is_back_to_back,days_rest,is_starter,played";

    #[test]
    fn game_log_csv_roundtrip() {
        let csv_data = format!(
            "{HEADER}
201939,Stephen Curry,2024-25,1610612744,GSW,G,2024-10-22,32.5,27,6,5,1,0,3,48.5,41.2,92.0,8,true,false,3,true,true
201939,Stephen Curry,2024-25,1610612744,GSW,G,2024-10-23,0,0,0,0,0,0,0,,,,0,false,true,0,true,false"
        );

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(games.len(), 2);

        let g = &games[0];
        assert_eq!(g.player_id, 201939);
        assert_eq!(g.player_name, "Stephen Curry");
        assert_eq!(g.team_tricode, "GSW");
        assert_eq!(g.game_date, NaiveDate::from_ymd_opt(2024, 10, 22).unwrap());
        assert!((g.minutes - 32.5).abs() < f64::EPSILON);
        assert!((g.points - 27.0).abs() < f64::EPSILON);
        assert_eq!(g.fg_pct, Some(48.5));
        assert!(g.is_home);
        assert!(!g.is_back_to_back);
        assert_eq!(g.days_rest, 3);
        assert!(g.is_starter);
        assert!(g.played);

        let dnp = &games[1];
        assert!(!dnp.played);
        assert!(dnp.is_back_to_back);
        assert_eq!(dnp.fg_pct, None);
        assert_eq!(dnp.three_pct, None);
    }

    #[test]
    fn upper_case_export_headers_accepted() {
        let csv_data = "\
PLAYER_ID,PLAYER_NAME,SEASON,TEAM_ID,TEAM_ABBREVIATION,GAME_DATE,MIN,PTS,AST,REB,STL,BLK,TOV,FG_PCT,FG3_PCT,FT_PCT,PLUS_MINUS,IS_HOME,DAYS_REST,IS_STARTER,WL
2544,LeBron James,2024-25,1610612747,LAL,2024-11-04T00:00:00,35,25,9,8,1,1,4,52.0,38.0,75.0,-2,0,1,1,L";

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(games.len(), 1);
        let g = &games[0];
        assert_eq!(g.player_id, 2544);
        assert_eq!(g.team_tricode, "LAL");
        assert_eq!(g.game_date, NaiveDate::from_ymd_opt(2024, 11, 4).unwrap());
        assert!(!g.is_home);
        assert!(g.is_starter);
        assert!(g.played);
        assert_eq!(g.position, "");
    }

    #[test]
    fn missing_stats_default_to_zero() {
        let csv_data = "\
player_id,player_name,season,team_id,game_date,minutes
5,Bench Big,2024-25,T1,2024-12-01,12";

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        let g = &games[0];
        assert_eq!(g.points, 0.0);
        assert_eq!(g.plus_minus, 0.0);
        assert_eq!(g.days_rest, 1);
        assert!(!g.is_back_to_back);
        assert!(g.played);
    }

    #[test]
    fn played_inferred_from_minutes_when_absent() {
        let csv_data = "\
player_id,player_name,season,team_id,game_date,minutes
5,Bench Big,2024-25,T1,2024-12-01,0
5,Bench Big,2024-25,T1,2024-12-03,";

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(games.len(), 2);
        assert!(games.iter().all(|g| !g.played));
    }

    #[test]
    fn back_to_back_and_rest_fill_each_other() {
        let csv_data = "\
player_id,player_name,season,team_id,game_date,minutes,days_rest,is_back_to_back
5,A,2024-25,T1,2024-12-01,20,0,
5,A,2024-25,T1,2024-12-02,20,,yes";

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        assert!(games[0].is_back_to_back);
        assert_eq!(games[1].days_rest, 0);
        assert!(games[1].is_back_to_back);
    }

    #[test]
    fn invalid_rows_skipped() {
        let csv_data = format!(
            "{HEADER}
1,Valid,2024-25,T1,T1,G,2024-11-01,30,10,2,2,0,0,1,45,30,80,1,true,false,1,true,true
2,Negative Minutes,2024-25,T1,T1,G,2024-11-01,-5,10,2,2,0,0,1,45,30,80,1,true,false,1,true,true
3,Bad Date,2024-25,T1,T1,G,11/01/2024,30,10,2,2,0,0,1,45,30,80,1,true,false,1,true,true
4,Bad Pct,2024-25,T1,T1,G,2024-11-01,30,10,2,2,0,0,1,145,30,80,1,true,false,1,true,true
5,Bad Flag,2024-25,T1,T1,G,2024-11-01,30,10,2,2,0,0,1,45,30,80,1,maybe,false,1,true,true
6,Not A Number,2024-25,T1,T1,G,2024-11-01,thirty,10,2,2,0,0,1,45,30,80,1,true,false,1,true,true
7,Negative Rest,2024-25,T1,T1,G,2024-11-01,30,10,2,2,0,0,1,45,30,80,1,true,false,-1,true,true
8,NaN Points,2024-25,T1,T1,G,2024-11-01,30,NaN,2,2,0,0,1,45,30,80,1,true,false,1,true,true"
        );

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].player_name, "Valid");
    }

    #[test]
    fn rest_beyond_u32_is_rejected_not_wrapped() {
        let csv_data = format!(
            "{HEADER}
1,Valid,2024-25,T1,T1,G,2024-11-01,30,10,2,2,0,0,1,45,30,80,1,true,false,2,true,true
2,Huge Rest,2024-25,T1,T1,G,2024-11-01,30,10,2,2,0,0,1,45,30,80,1,true,,4294967296,true,true"
        );

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].player_id, 1);
        assert_eq!(games[0].days_rest, 2);
    }

    #[test]
    fn names_trimmed() {
        let csv_data = "\
player_id,player_name,season,team_id,team_tricode,game_date,minutes
1,  Jrue Holiday  , 2024-25 , T1 , BOS ,2024-11-01,30";

        let games = load_game_logs_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(games[0].player_name, "Jrue Holiday");
        assert_eq!(games[0].season, "2024-25");
        assert_eq!(games[0].team_tricode, "BOS");
    }

    #[test]
    fn empty_csv_returns_empty_vec() {
        let games = load_game_logs_from_reader(HEADER.as_bytes()).unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn roster_loading() {
        let csv_data = "\
team_id,season,player_id,player_name,is_starter,is_injured
BOS,2024-25,1,Jayson Tatum,true,false
BOS,2024-25,2,Kristaps Porzingis,1,1
BOS,2024-25,3,Sam Hauser,,
BOS,2024-25,4,Bad Flag,sometimes,false";

        let roster = load_roster_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(roster.len(), 3);
        assert!(roster[0].is_starter && !roster[0].is_injured);
        assert!(roster[1].is_starter && roster[1].is_injured);
        assert!(!roster[2].is_starter && !roster[2].is_injured);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_game_logs(Path::new("/nonexistent/game_logs.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
