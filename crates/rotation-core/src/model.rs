// Game log records, per-game context, and roster entries.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Player identifier as issued by the upstream stats provider.
pub type PlayerId = i64;

// ---------------------------------------------------------------------------
// Game logs
// ---------------------------------------------------------------------------

/// One player's line for one game. Immutable once ingested.
///
/// For a fixed `(player_id, season)` there is at most one record per
/// `game_date`. Records with `played == false` are DNPs and never take part
/// in aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLogRecord {
    pub player_id: PlayerId,
    pub player_name: String,
    pub season: String,
    pub team_id: String,
    pub team_tricode: String,
    pub position: String,
    pub game_date: NaiveDate,
    pub minutes: f64,
    pub points: f64,
    pub assists: f64,
    pub rebounds: f64,
    pub steals: f64,
    pub blocks: f64,
    pub turnovers: f64,
    /// Shooting percentages on a 0-100 scale. `None` when the provider left
    /// the column blank (no attempts).
    pub fg_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub plus_minus: f64,
    pub is_home: bool,
    pub is_back_to_back: bool,
    pub days_rest: u32,
    pub is_starter: bool,
    pub played: bool,
}

impl GameLogRecord {
    /// Rested: at least two days off and not the second night of a back-to-back.
    pub fn is_rested(&self) -> bool {
        self.days_rest >= 2 && !self.is_back_to_back
    }
}

// ---------------------------------------------------------------------------
// Game context
// ---------------------------------------------------------------------------

/// Situational inputs for a single upcoming game. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameContext {
    pub is_home: bool,
    pub days_rest: u32,
    #[serde(default)]
    pub injured_teammates: BTreeSet<PlayerId>,
    #[serde(default)]
    pub opponent_id: Option<String>,
    #[serde(default)]
    pub game_date: Option<NaiveDate>,
    /// Filled in by the rotation projector from the roster; echoed back in
    /// team output.
    #[serde(default)]
    pub is_starter: Option<bool>,
}

impl GameContext {
    pub fn new(is_home: bool, days_rest: u32) -> Self {
        Self {
            is_home,
            days_rest,
            ..Self::default()
        }
    }

    pub fn with_injured<I: IntoIterator<Item = PlayerId>>(mut self, ids: I) -> Self {
        self.injured_teammates.extend(ids);
        self
    }

    /// Number of injured teammates, not counting `player_id` itself.
    pub fn injured_teammates_excluding(&self, player_id: PlayerId) -> usize {
        self.injured_teammates
            .iter()
            .filter(|&&id| id != player_id)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// One player on a team's roster for a season, as supplied by the roster
/// provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub team_id: String,
    pub season: String,
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_starter: bool,
    pub is_injured: bool,
}
