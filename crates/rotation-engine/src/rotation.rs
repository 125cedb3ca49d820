// Team rotation projection: project every healthy roster player for one
// game, rank them, and summarize the team.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rotation_core::model::{GameContext, PlayerId, RosterEntry};
use rotation_core::store::RosterProvider;

use crate::projection::{MinutesProjection, ProjectionEngine};
use crate::stats::math::{mean, round_to};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RosterStatus {
    Active,
    Injured,
    Error,
}

/// The situational inputs a player was projected under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerContext {
    pub is_starter: bool,
    pub is_home: bool,
    pub days_rest: u32,
    pub injured_teammates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPlayerProjection {
    /// 1-based position in the ranked rotation. Only set for active players.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    pub player_id: PlayerId,
    pub player_name: String,
    pub status: RosterStatus,
    pub context: PlayerContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<MinutesProjection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TeamPlayerProjection {
    pub fn projected_minutes(&self) -> f64 {
        self.projection
            .as_ref()
            .map(|p| p.projected_minutes)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub total_projected_minutes: f64,
    pub active_players: usize,
    pub injured_players: usize,
    pub errored_players: usize,
    pub average_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamProjection {
    pub team_id: String,
    pub season: String,
    /// Active players, projected minutes descending.
    pub rotation: Vec<TeamPlayerProjection>,
    pub injured: Vec<TeamPlayerProjection>,
    pub errors: Vec<TeamPlayerProjection>,
    pub summary: TeamSummary,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RotationError {
    #[error("team not found")]
    TeamNotFound { team_id: String, season: String },

    #[error("roster provider error: {0}")]
    Store(String),
}

fn player_context(entry: &RosterEntry, ctx: &GameContext) -> PlayerContext {
    PlayerContext {
        is_starter: entry.is_starter,
        is_home: ctx.is_home,
        days_rest: ctx.days_rest,
        injured_teammates: ctx.injured_teammates_excluding(entry.player_id),
    }
}

/// Projected minutes descending, then starters first, then player id.
fn rank_order(a: &TeamPlayerProjection, b: &TeamPlayerProjection) -> std::cmp::Ordering {
    b.projected_minutes()
        .total_cmp(&a.projected_minutes())
        .then_with(|| b.context.is_starter.cmp(&a.context.is_starter))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

#[derive(Clone)]
pub struct RotationProjector {
    engine: ProjectionEngine,
    rosters: Arc<dyn RosterProvider>,
    max_concurrency: usize,
}

impl RotationProjector {
    pub fn new(
        engine: ProjectionEngine,
        rosters: Arc<dyn RosterProvider>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            engine,
            rosters,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Project one team's rotation for an upcoming game.
    ///
    /// Players marked injured on the roster, or listed in
    /// `context.injured_teammates`, are reported separately and never ranked.
    /// Every other player is projected with the team's injured players as
    /// their unavailable teammates. A failure for one player is recorded in
    /// `errors` and does not stop the others.
    pub async fn project_team_minutes(
        &self,
        team_id: &str,
        season: &str,
        context: &GameContext,
    ) -> Result<TeamProjection, RotationError> {
        let roster = {
            let rosters = Arc::clone(&self.rosters);
            let (team, season) = (team_id.to_string(), season.to_string());
            tokio::task::spawn_blocking(move || rosters.load_roster(&team, &season))
                .await
                .map_err(|e| RotationError::Store(format!("roster task failed: {e}")))?
                .map_err(|e| RotationError::Store(format!("{e:#}")))?
        };

        if roster.is_empty() {
            return Err(RotationError::TeamNotFound {
                team_id: team_id.to_string(),
                season: season.to_string(),
            });
        }

        let injured_ids: BTreeSet<PlayerId> = roster
            .iter()
            .filter(|p| p.is_injured || context.injured_teammates.contains(&p.player_id))
            .map(|p| p.player_id)
            .collect();

        let team_context = GameContext {
            injured_teammates: injured_ids.clone(),
            ..context.clone()
        };

        let (out, available): (Vec<RosterEntry>, Vec<RosterEntry>) = roster
            .into_iter()
            .partition(|p| injured_ids.contains(&p.player_id));

        let mut injured: Vec<TeamPlayerProjection> = out
            .iter()
            .map(|entry| TeamPlayerProjection {
                rank: None,
                player_id: entry.player_id,
                player_name: entry.player_name.clone(),
                status: RosterStatus::Injured,
                context: player_context(entry, &team_context),
                projection: None,
                error: None,
            })
            .collect();
        injured.sort_by_key(|p| p.player_id);

        let outcomes: Vec<(RosterEntry, Result<MinutesProjection, String>)> =
            stream::iter(available)
                .map(|entry| {
                    let engine = self.engine.clone();
                    let ctx = GameContext {
                        is_starter: Some(entry.is_starter),
                        ..team_context.clone()
                    };
                    let (team, season) = (team_id.to_string(), season.to_string());
                    async move {
                        let player_id = entry.player_id;
                        let result = tokio::task::spawn_blocking(move || {
                            engine.project_minutes(player_id, &team, &season, &ctx)
                        })
                        .await
                        .map_err(|e| format!("projection task failed: {e}"))
                        .and_then(|r| r.map_err(|e| e.to_string()));
                        (entry, result)
                    }
                })
                .buffer_unordered(self.max_concurrency)
                .collect::<Vec<_>>()
                .await;

        let mut rotation = Vec::new();
        let mut errors = Vec::new();
        for (entry, result) in outcomes {
            let context = player_context(&entry, &team_context);
            match result {
                Ok(projection) => rotation.push(TeamPlayerProjection {
                    rank: None,
                    player_id: entry.player_id,
                    player_name: entry.player_name,
                    status: RosterStatus::Active,
                    context,
                    projection: Some(projection),
                    error: None,
                }),
                Err(message) => {
                    warn!(team_id, player_id = entry.player_id, "projection failed: {message}");
                    errors.push(TeamPlayerProjection {
                        rank: None,
                        player_id: entry.player_id,
                        player_name: entry.player_name,
                        status: RosterStatus::Error,
                        context,
                        projection: None,
                        error: Some(message),
                    });
                }
            }
        }

        rotation.sort_by(rank_order);
        for (i, player) in rotation.iter_mut().enumerate() {
            player.rank = Some(i + 1);
        }
        errors.sort_by_key(|p| p.player_id);

        let confidences: Vec<f64> = rotation
            .iter()
            .filter_map(|p| p.projection.as_ref().map(|proj| proj.confidence))
            .collect();
        let summary = TeamSummary {
            total_projected_minutes: round_to(
                rotation.iter().map(TeamPlayerProjection::projected_minutes).sum(),
                1,
            ),
            active_players: rotation.len(),
            injured_players: injured.len(),
            errored_players: errors.len(),
            average_confidence: round_to(mean(&confidences), 3),
        };

        info!(
            team_id,
            season,
            active = summary.active_players,
            injured = summary.injured_players,
            errored = summary.errored_players,
            total_minutes = summary.total_projected_minutes,
            "projected team rotation"
        );

        Ok(TeamProjection {
            team_id: team_id.to_string(),
            season: season.to_string(),
            rotation,
            injured,
            errors,
            summary,
        })
    }
}
