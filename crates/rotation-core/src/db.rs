// SQLite persistence for game logs, season profiles, and rosters.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::model::{GameLogRecord, PlayerId, RosterEntry};
use crate::profile::SeasonProfile;
use crate::store::{GameLogStore, ProfileStore, RosterProvider};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed implementation of every store seam the engine needs.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS game_logs (
                player_id       INTEGER NOT NULL,
                player_name     TEXT NOT NULL,
                season          TEXT NOT NULL,
                team_id         TEXT NOT NULL,
                team_tricode    TEXT NOT NULL,
                position        TEXT NOT NULL,
                game_date       TEXT NOT NULL,
                minutes         REAL NOT NULL,
                points          REAL NOT NULL,
                assists         REAL NOT NULL,
                rebounds        REAL NOT NULL,
                steals          REAL NOT NULL,
                blocks          REAL NOT NULL,
                turnovers       REAL NOT NULL,
                fg_pct          REAL,
                three_pct       REAL,
                ft_pct          REAL,
                plus_minus      REAL NOT NULL,
                is_home         INTEGER NOT NULL,
                is_back_to_back INTEGER NOT NULL,
                days_rest       INTEGER NOT NULL,
                is_starter      INTEGER NOT NULL,
                played          INTEGER NOT NULL,
                PRIMARY KEY (player_id, season, game_date)
            );

            CREATE TABLE IF NOT EXISTS season_profiles (
                player_id       INTEGER NOT NULL,
                season          TEXT NOT NULL,
                profile         TEXT NOT NULL,
                last_calculated TEXT NOT NULL,
                PRIMARY KEY (player_id, season)
            );

            CREATE TABLE IF NOT EXISTS rosters (
                team_id     TEXT NOT NULL,
                season      TEXT NOT NULL,
                player_id   INTEGER NOT NULL,
                player_name TEXT NOT NULL,
                is_starter  INTEGER NOT NULL,
                is_injured  INTEGER NOT NULL,
                PRIMARY KEY (team_id, season, player_id)
            );
            ",
        )
        .context("failed to create database schema")?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_game_logs_season ON game_logs(season);",
        )
        .context("failed to create game_logs season index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Game logs
    // ------------------------------------------------------------------

    /// Insert game log records in a single transaction. A record with the same
    /// `(player_id, season, game_date)` as an existing row replaces it.
    /// Returns the number of rows written.
    pub fn upsert_game_logs(&self, records: &[GameLogRecord]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin game log import")?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO game_logs
                        (player_id, player_name, season, team_id, team_tricode, position,
                         game_date, minutes, points, assists, rebounds, steals, blocks,
                         turnovers, fg_pct, three_pct, ft_pct, plus_minus, is_home,
                         is_back_to_back, days_rest, is_starter, played)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                             ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                )
                .context("failed to prepare game log insert")?;

            for r in records {
                stmt.execute(params![
                    r.player_id,
                    r.player_name,
                    r.season,
                    r.team_id,
                    r.team_tricode,
                    r.position,
                    r.game_date.format(DATE_FORMAT).to_string(),
                    r.minutes,
                    r.points,
                    r.assists,
                    r.rebounds,
                    r.steals,
                    r.blocks,
                    r.turnovers,
                    r.fg_pct,
                    r.three_pct,
                    r.ft_pct,
                    r.plus_minus,
                    r.is_home,
                    r.is_back_to_back,
                    r.days_rest,
                    r.is_starter,
                    r.played,
                ])
                .with_context(|| {
                    format!(
                        "failed to insert game log for player {} on {}",
                        r.player_id, r.game_date
                    )
                })?;
            }
        }

        tx.commit().context("failed to commit game log import")?;
        Ok(records.len())
    }

    /// Count all stored game log rows, DNPs included.
    pub fn game_log_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM game_logs", [], |row| row.get(0))
            .context("failed to count game logs")?;
        Ok(count as usize)
    }

    // ------------------------------------------------------------------
    // Season profiles
    // ------------------------------------------------------------------

    /// Remove a stored profile. Returns `true` if a row was deleted.
    pub fn delete_profile(&self, player_id: PlayerId, season: &str) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn
            .execute(
                "DELETE FROM season_profiles WHERE player_id = ?1 AND season = ?2",
                params![player_id, season],
            )
            .context("failed to delete season profile")?;
        Ok(deleted > 0)
    }

    pub fn profile_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM season_profiles", [], |row| row.get(0))
            .context("failed to count season profiles")?;
        Ok(count as usize)
    }

    // ------------------------------------------------------------------
    // Rosters
    // ------------------------------------------------------------------

    /// Replace the stored rosters for every `(team_id, season)` present in
    /// `entries`. Teams not mentioned are left untouched. Runs in one
    /// transaction so a team never ends up half-written.
    pub fn replace_rosters(&self, entries: &[RosterEntry]) -> Result<usize> {
        let mut by_team: BTreeMap<(&str, &str), Vec<&RosterEntry>> = BTreeMap::new();
        for entry in entries {
            by_team
                .entry((entry.team_id.as_str(), entry.season.as_str()))
                .or_default()
                .push(entry);
        }

        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin roster import")?;

        for ((team_id, season), team_entries) in &by_team {
            tx.execute(
                "DELETE FROM rosters WHERE team_id = ?1 AND season = ?2",
                params![team_id, season],
            )
            .with_context(|| format!("failed to clear roster for team {team_id}"))?;

            for e in team_entries {
                tx.execute(
                    "INSERT OR REPLACE INTO rosters
                        (team_id, season, player_id, player_name, is_starter, is_injured)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        e.team_id,
                        e.season,
                        e.player_id,
                        e.player_name,
                        e.is_starter,
                        e.is_injured
                    ],
                )
                .with_context(|| {
                    format!("failed to insert roster entry for player {}", e.player_id)
                })?;
            }
        }

        tx.commit().context("failed to commit roster import")?;
        Ok(entries.len())
    }
}

fn game_log_from_row(row: &Row<'_>) -> rusqlite::Result<GameLogRecord> {
    let date_str: String = row.get(6)?;
    let game_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(GameLogRecord {
        player_id: row.get(0)?,
        player_name: row.get(1)?,
        season: row.get(2)?,
        team_id: row.get(3)?,
        team_tricode: row.get(4)?,
        position: row.get(5)?,
        game_date,
        minutes: row.get(7)?,
        points: row.get(8)?,
        assists: row.get(9)?,
        rebounds: row.get(10)?,
        steals: row.get(11)?,
        blocks: row.get(12)?,
        turnovers: row.get(13)?,
        fg_pct: row.get(14)?,
        three_pct: row.get(15)?,
        ft_pct: row.get(16)?,
        plus_minus: row.get(17)?,
        is_home: row.get(18)?,
        is_back_to_back: row.get(19)?,
        days_rest: row.get(20)?,
        is_starter: row.get(21)?,
        played: row.get(22)?,
    })
}

impl GameLogStore for Database {
    fn load_played_games(&self, player_id: PlayerId, season: &str) -> Result<Vec<GameLogRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, player_name, season, team_id, team_tricode, position,
                        game_date, minutes, points, assists, rebounds, steals, blocks,
                        turnovers, fg_pct, three_pct, ft_pct, plus_minus, is_home,
                        is_back_to_back, days_rest, is_starter, played
                 FROM game_logs
                 WHERE player_id = ?1 AND season = ?2 AND played = 1
                 ORDER BY game_date",
            )
            .context("failed to prepare load_played_games query")?;

        let games = stmt
            .query_map(params![player_id, season], game_log_from_row)
            .context("failed to query game logs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game log rows")?;

        Ok(games)
    }

    fn distinct_player_seasons(&self, season: Option<&str>) -> Result<Vec<(PlayerId, String)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT player_id, season FROM game_logs
                 WHERE ?1 IS NULL OR season = ?1
                 ORDER BY season, player_id",
            )
            .context("failed to prepare distinct_player_seasons query")?;

        let pairs = stmt
            .query_map(params![season], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("failed to query player seasons")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player season rows")?;

        Ok(pairs)
    }
}

impl ProfileStore for Database {
    fn load_profile(&self, player_id: PlayerId, season: &str) -> Result<Option<SeasonProfile>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT profile FROM season_profiles WHERE player_id = ?1 AND season = ?2")
            .context("failed to prepare load_profile query")?;

        let mut rows = stmt
            .query_map(params![player_id, season], |row| row.get::<_, String>(0))
            .context("failed to query season profile")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read profile row")?;
                let profile: SeasonProfile = serde_json::from_str(&json_str)
                    .context("failed to deserialize season profile")?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Whole-record replace keyed by `(player_id, season)`.
    fn upsert_profile(&self, profile: &SeasonProfile) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(profile).context("failed to serialize season profile")?;
        conn.execute(
            "INSERT OR REPLACE INTO season_profiles (player_id, season, profile, last_calculated)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                profile.player_id,
                profile.season,
                json_str,
                profile.last_calculated.to_rfc3339()
            ],
        )
        .context("failed to upsert season profile")?;
        Ok(())
    }
}

impl RosterProvider for Database {
    fn load_roster(&self, team_id: &str, season: &str) -> Result<Vec<RosterEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, season, player_id, player_name, is_starter, is_injured
                 FROM rosters WHERE team_id = ?1 AND season = ?2
                 ORDER BY player_id",
            )
            .context("failed to prepare load_roster query")?;

        let entries = stmt
            .query_map(params![team_id, season], |row| {
                Ok(RosterEntry {
                    team_id: row.get(0)?,
                    season: row.get(1)?,
                    player_id: row.get(2)?,
                    player_name: row.get(3)?,
                    is_starter: row.get(4)?,
                    is_injured: row.get(5)?,
                })
            })
            .context("failed to query roster")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map roster rows")?;

        Ok(entries)
    }
}
