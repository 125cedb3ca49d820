// Season statistics aggregation: one player-season of game logs in, one
// SeasonProfile out.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use rotation_core::config::TrendBucketing;
use rotation_core::model::{GameLogRecord, PlayerId};
use rotation_core::profile::{
    MinutesDistribution, MinutesRange, MonthlyTrend, RollingWindows, SeasonProfile, SplitStats,
    Splits, StatAverages, WindowStats, WINDOW_SIZES,
};
use rotation_core::store::GameLogStore;

use super::math::{percent, population_std_dev, round_to};

// ---------------------------------------------------------------------------
// Stat totals
// ---------------------------------------------------------------------------

/// Running sums for the tracked stat line. Absent shooting percentages add 0
/// but still count towards the game total.
#[derive(Debug, Clone, Copy, Default)]
struct StatTotals {
    games: usize,
    minutes: f64,
    points: f64,
    assists: f64,
    rebounds: f64,
    steals: f64,
    blocks: f64,
    turnovers: f64,
    fg_pct: f64,
    three_pct: f64,
    ft_pct: f64,
    plus_minus: f64,
}

impl StatTotals {
    fn plus(self, g: &GameLogRecord) -> Self {
        Self {
            games: self.games + 1,
            minutes: self.minutes + g.minutes,
            points: self.points + g.points,
            assists: self.assists + g.assists,
            rebounds: self.rebounds + g.rebounds,
            steals: self.steals + g.steals,
            blocks: self.blocks + g.blocks,
            turnovers: self.turnovers + g.turnovers,
            fg_pct: self.fg_pct + g.fg_pct.unwrap_or(0.0),
            three_pct: self.three_pct + g.three_pct.unwrap_or(0.0),
            ft_pct: self.ft_pct + g.ft_pct.unwrap_or(0.0),
            plus_minus: self.plus_minus + g.plus_minus,
        }
    }

    fn of<'a, I: IntoIterator<Item = &'a GameLogRecord>>(games: I) -> Self {
        games.into_iter().fold(Self::default(), Self::plus)
    }

    fn averages(&self) -> StatAverages {
        if self.games == 0 {
            return StatAverages::default();
        }
        let n = self.games as f64;
        let avg = |total: f64| round_to(total / n, 2);
        StatAverages {
            minutes: avg(self.minutes),
            points: avg(self.points),
            assists: avg(self.assists),
            rebounds: avg(self.rebounds),
            steals: avg(self.steals),
            blocks: avg(self.blocks),
            turnovers: avg(self.turnovers),
            fg_pct: avg(self.fg_pct),
            three_pct: avg(self.three_pct),
            ft_pct: avg(self.ft_pct),
            plus_minus: avg(self.plus_minus),
        }
    }
}

fn minutes_of(games: &[&GameLogRecord]) -> Vec<f64> {
    games.iter().map(|g| g.minutes).collect()
}

// ---------------------------------------------------------------------------
// Profile sections
// ---------------------------------------------------------------------------

/// Window over the first `size` entries of `recent_first`.
fn window(recent_first: &[&GameLogRecord], size: usize) -> Option<WindowStats> {
    let games = &recent_first[..size.min(recent_first.len())];
    if games.is_empty() {
        return None;
    }
    Some(WindowStats {
        games_count: games.len(),
        averages: StatTotals::of(games.iter().copied()).averages(),
        minutes_std_dev: round_to(population_std_dev(&minutes_of(games)), 2),
    })
}

fn split<F>(games: &[&GameLogRecord], predicate: F) -> SplitStats
where
    F: Fn(&GameLogRecord) -> bool,
{
    let (count, minutes, points) = games
        .iter()
        .filter(|g| predicate(**g))
        .fold((0usize, 0.0, 0.0), |(c, m, p), g| (c + 1, m + g.minutes, p + g.points));

    if count == 0 {
        return SplitStats::default();
    }
    SplitStats {
        games_count: count,
        avg_minutes: round_to(minutes / count as f64, 2),
        avg_points: round_to(points / count as f64, 2),
    }
}

fn trend_label(game: &GameLogRecord, bucketing: TrendBucketing) -> String {
    match bucketing {
        TrendBucketing::Month => game.game_date.format("%B").to_string(),
        TrendBucketing::YearMonth => game.game_date.format("%B %Y").to_string(),
    }
}

/// Buckets appear in the order their first game is encountered.
fn monthly_trend(games: &[&GameLogRecord], bucketing: TrendBucketing) -> Vec<MonthlyTrend> {
    let buckets = games.iter().fold(
        Vec::<(String, usize, f64)>::new(),
        |mut acc, g| {
            let label = trend_label(g, bucketing);
            match acc.iter_mut().find(|(l, _, _)| *l == label) {
                Some((_, count, total)) => {
                    *count += 1;
                    *total += g.minutes;
                }
                None => acc.push((label, 1, g.minutes)),
            }
            acc
        },
    );

    buckets
        .into_iter()
        .map(|(month_label, games_count, total)| MonthlyTrend {
            month_label,
            games_count,
            average_minutes: round_to(total / games_count as f64, 2),
        })
        .collect()
}

fn distribution(games: &[&GameLogRecord]) -> MinutesDistribution {
    let n = games.len();
    let share = |pred: &dyn Fn(f64) -> bool| {
        round_to(percent(games.iter().filter(|g| pred(g.minutes)).count(), n), 1)
    };
    MinutesDistribution {
        under20: share(&|m: f64| m < 20.0),
        from20_to30: share(&|m: f64| (20.0..30.0).contains(&m)),
        from30_to35: share(&|m: f64| (30.0..35.0).contains(&m)),
        over35: share(&|m: f64| m >= 35.0),
    }
}

fn minutes_range(games: &[&GameLogRecord]) -> MinutesRange {
    let (min, max) = games
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), g| {
            (lo.min(g.minutes), hi.max(g.minutes))
        });
    if games.is_empty() {
        return MinutesRange::default();
    }
    MinutesRange { min, max }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Build the season profile for `(player_id, season)` from its game logs.
///
/// Only played games for that player-season are considered; input order does
/// not matter. Returns `None` when no played game exists, so callers can tell
/// "no data" apart from a profile of zeros.
pub fn compute_season_profile(
    player_id: PlayerId,
    season: &str,
    games: &[GameLogRecord],
    bucketing: TrendBucketing,
    calculated_at: DateTime<Utc>,
) -> Option<SeasonProfile> {
    let mut played: Vec<&GameLogRecord> = games
        .iter()
        .filter(|g| g.played && g.player_id == player_id && g.season == season)
        .collect();
    played.sort_by_key(|g| g.game_date);

    let latest = *played.last()?;
    let games_played = played.len();
    let games_started = played.iter().filter(|g| g.is_starter).count();

    let recent_first: Vec<&GameLogRecord> = played.iter().rev().copied().collect();
    let rolling = WINDOW_SIZES
        .iter()
        .fold(RollingWindows::default(), |mut rolling, &size| {
            rolling.set(size, window(&recent_first, size));
            rolling
        });

    let splits = Splits {
        home: split(&played, |g| g.is_home),
        away: split(&played, |g| !g.is_home),
        back_to_back: split(&played, |g| g.is_back_to_back),
        rested: split(&played, GameLogRecord::is_rested),
        starter: split(&played, |g| g.is_starter),
        bench: split(&played, |g| !g.is_starter),
    };

    let profile = SeasonProfile {
        player_id,
        player_name: latest.player_name.clone(),
        season: season.to_string(),
        team_id: latest.team_id.clone(),
        season_averages: StatTotals::of(played.iter().copied()).averages(),
        games_played,
        games_started,
        starter_rate: round_to(percent(games_started, games_played), 1),
        rolling,
        splits,
        monthly_trend: monthly_trend(&played, bucketing),
        minutes_std_dev: round_to(population_std_dev(&minutes_of(&played)), 2),
        minutes_range: minutes_range(&played),
        distribution: distribution(&played),
        last_calculated: calculated_at,
        games_processed: games_played,
    };

    debug!(
        player_id,
        season,
        games_played,
        avg_minutes = profile.season_averages.minutes,
        "computed season profile"
    );

    Some(profile)
}

/// Store-backed aggregator: reads a player-season's played games and builds
/// its profile. Does not write anything; upserting is the caller's call.
#[derive(Clone)]
pub struct SeasonAggregator {
    logs: Arc<dyn GameLogStore>,
    bucketing: TrendBucketing,
}

impl SeasonAggregator {
    pub fn new(logs: Arc<dyn GameLogStore>, bucketing: TrendBucketing) -> Self {
        Self { logs, bucketing }
    }

    /// `Ok(None)` means the player has no played games that season.
    pub fn compute_season_profile(
        &self,
        player_id: PlayerId,
        season: &str,
    ) -> Result<Option<SeasonProfile>> {
        let games = self
            .logs
            .load_played_games(player_id, season)
            .with_context(|| format!("failed to load game logs for {player_id}/{season}"))?;
        Ok(compute_season_profile(
            player_id,
            season,
            &games,
            self.bucketing,
            Utc::now(),
        ))
    }
}
