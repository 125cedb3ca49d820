// Minutes projection: blended baseline, contextual adjustments, confidence.
//
// Rule-based and fully explainable: every delta applied to the baseline is
// reported with its reason, in application order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rotation_core::config::ProjectionPolicy;
use rotation_core::model::{GameContext, PlayerId};
use rotation_core::profile::SeasonProfile;
use rotation_core::store::ProfileStore;

use crate::stats::math::round_to;

pub const REASON_BACK_TO_BACK: &str = "Back-to-back game — workload management";
pub const REASON_EXTENDED_REST: &str = "Extended rest — full availability expected";
pub const REASON_HOME: &str = "Home game";
pub const REASON_TEAMMATE_OUT: &str = "Increased role — teammate unavailable";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// Which baseline rule applied, by sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMethod {
    /// last 5 / last 10 / season blend.
    RecentBlend,
    /// last 3 / season blend.
    ShortBlend,
    SeasonAverage,
}

/// A signed delta applied to the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub value: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub baseline_minutes: f64,
    pub baseline_method: BaselineMethod,
    pub adjustments: Vec<Adjustment>,
    /// Injured teammates considered, including any beyond the bonus cap.
    pub injured_teammates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinutesProjection {
    pub player_id: PlayerId,
    pub team_id: String,
    pub season: String,
    pub games_played: usize,
    pub projected_minutes: f64,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("insufficient data")]
    InsufficientData { player_id: PlayerId, season: String },

    #[error("profile store error: {0}")]
    Store(String),
}

// ---------------------------------------------------------------------------
// Rule steps
// ---------------------------------------------------------------------------

/// Pre-adjustment minutes, unrounded.
pub fn baseline_minutes(profile: &SeasonProfile, policy: &ProjectionPolicy) -> (f64, BaselineMethod) {
    let season = profile.season_averages.minutes;
    let gp = profile.games_played;

    if gp >= policy.recent_min_games {
        let w = policy.recent_blend;
        (
            w.last5 * profile.window_minutes_or_season(5)
                + w.last10 * profile.window_minutes_or_season(10)
                + w.season * season,
            BaselineMethod::RecentBlend,
        )
    } else if gp >= policy.short_min_games {
        let w = policy.short_blend;
        (
            w.last3 * profile.window_minutes_or_season(3) + w.season * season,
            BaselineMethod::ShortBlend,
        )
    } else {
        (season, BaselineMethod::SeasonAverage)
    }
}

/// Contextual adjustments in fixed order: rest, home, injuries. Zero-valued
/// adjustments are left out.
pub fn adjustments_for(
    context: &GameContext,
    injured_teammates: usize,
    policy: &ProjectionPolicy,
) -> Vec<Adjustment> {
    let mut out = Vec::new();
    let mut push = |value: f64, reason: &str| {
        if value != 0.0 {
            out.push(Adjustment {
                value,
                reason: reason.to_string(),
            });
        }
    };

    if context.days_rest == 0 {
        push(policy.back_to_back_adjustment, REASON_BACK_TO_BACK);
    }
    if context.days_rest >= policy.extended_rest_days {
        push(policy.extended_rest_adjustment, REASON_EXTENDED_REST);
    }
    if context.is_home {
        push(policy.home_adjustment, REASON_HOME);
    }

    let mut remaining = policy.injury_adjustment_cap;
    for _ in 0..injured_teammates {
        let value = policy.injury_adjustment_per_teammate.min(remaining).max(0.0);
        remaining -= value;
        push(value, REASON_TEAMMATE_OUT);
    }

    out
}

/// Sample-size tier score minus a volatility penalty, clamped to the policy
/// floor and ceiling. Rounded to three decimals.
pub fn confidence_for(
    games_played: usize,
    minutes_std_dev: f64,
    policy: &ProjectionPolicy,
) -> (f64, ConfidenceLevel) {
    let mut tiers = policy.confidence_tiers.clone();
    tiers.sort_by(|a, b| b.min_games.cmp(&a.min_games));
    let base = tiers
        .iter()
        .find(|t| games_played >= t.min_games)
        .map(|t| t.score)
        .unwrap_or(policy.confidence_floor);

    let penalty = (minutes_std_dev / policy.volatility_divisor).min(policy.volatility_penalty_cap);
    let confidence = round_to(
        (base - penalty).clamp(policy.confidence_floor, policy.confidence_ceiling),
        3,
    );

    let level = if confidence >= policy.high_confidence {
        ConfidenceLevel::High
    } else if confidence >= policy.medium_confidence {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    (confidence, level)
}

/// Project minutes from an already-loaded profile. Pure: no I/O, no state.
pub fn project_from_profile(
    profile: &SeasonProfile,
    team_id: &str,
    context: &GameContext,
    policy: &ProjectionPolicy,
) -> Result<MinutesProjection, ProjectionError> {
    if profile.games_played == 0 {
        return Err(ProjectionError::InsufficientData {
            player_id: profile.player_id,
            season: profile.season.clone(),
        });
    }

    let (baseline, baseline_method) = baseline_minutes(profile, policy);
    let injured_teammates = context.injured_teammates_excluding(profile.player_id);
    let adjustments = adjustments_for(context, injured_teammates, policy);

    let total: f64 = adjustments.iter().map(|a| a.value).sum();
    // Round once, after clamping; the breakdown gets a display copy.
    let projected_minutes = round_to((baseline + total).clamp(0.0, policy.max_minutes), 1);
    let (confidence, confidence_level) =
        confidence_for(profile.games_played, profile.minutes_std_dev, policy);

    Ok(MinutesProjection {
        player_id: profile.player_id,
        team_id: team_id.to_string(),
        season: profile.season.clone(),
        games_played: profile.games_played,
        projected_minutes,
        confidence,
        confidence_level,
        breakdown: Breakdown {
            baseline_minutes: round_to(baseline, 2),
            baseline_method,
            adjustments,
            injured_teammates,
        },
    })
}

// ---------------------------------------------------------------------------
// Store-backed engine
// ---------------------------------------------------------------------------

/// Loads the season profile and applies the projection policy. Cheap to
/// clone; holds only shared read-only handles.
#[derive(Clone)]
pub struct ProjectionEngine {
    profiles: Arc<dyn ProfileStore>,
    policy: Arc<ProjectionPolicy>,
}

impl ProjectionEngine {
    pub fn new(profiles: Arc<dyn ProfileStore>, policy: ProjectionPolicy) -> Self {
        Self {
            profiles,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &ProjectionPolicy {
        &self.policy
    }

    /// Project minutes for one player in one upcoming game. Always computed
    /// fresh from the stored profile.
    pub fn project_minutes(
        &self,
        player_id: PlayerId,
        team_id: &str,
        season: &str,
        context: &GameContext,
    ) -> Result<MinutesProjection, ProjectionError> {
        let profile = self
            .profiles
            .load_profile(player_id, season)
            .map_err(|e| ProjectionError::Store(format!("{e:#}")))?
            .ok_or_else(|| ProjectionError::InsufficientData {
                player_id,
                season: season.to_string(),
            })?;

        let projection = project_from_profile(&profile, team_id, context, &self.policy)?;
        debug!(
            player_id,
            season,
            projected = projection.projected_minutes,
            confidence = projection.confidence,
            "projected minutes"
        );
        Ok(projection)
    }
}
