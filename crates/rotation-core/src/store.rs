// Seams to the external collaborators: game log store, season profile
// store, and roster/injury provider.

use anyhow::Result;

use crate::model::{GameLogRecord, PlayerId, RosterEntry};
use crate::profile::SeasonProfile;

/// Read-only source of per-game records.
pub trait GameLogStore: Send + Sync {
    /// Played games (`played == true`) for one player-season, ordered by
    /// game date ascending.
    fn load_played_games(&self, player_id: PlayerId, season: &str) -> Result<Vec<GameLogRecord>>;

    /// Every distinct `(player_id, season)` pair that has at least one record,
    /// optionally restricted to a single season.
    fn distinct_player_seasons(&self, season: Option<&str>) -> Result<Vec<(PlayerId, String)>>;
}

/// Keyed store for materialized profiles. Writes replace the whole record.
pub trait ProfileStore: Send + Sync {
    fn load_profile(&self, player_id: PlayerId, season: &str) -> Result<Option<SeasonProfile>>;

    fn upsert_profile(&self, profile: &SeasonProfile) -> Result<()>;
}

/// Supplies a team's roster for a season together with injury status.
pub trait RosterProvider: Send + Sync {
    fn load_roster(&self, team_id: &str, season: &str) -> Result<Vec<RosterEntry>>;
}
