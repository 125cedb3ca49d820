// Batch profile refresh: rebuild and upsert the season profile of every
// player-season that has game logs.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use rotation_core::config::TrendBucketing;
use rotation_core::model::PlayerId;
use rotation_core::profile::SeasonProfile;
use rotation_core::store::{GameLogStore, ProfileStore};

use crate::stats::SeasonAggregator;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub player_id: PlayerId,
    pub season: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub processed: usize,
    pub upserted: usize,
    pub skipped_no_data: usize,
    pub errors: Vec<BatchFailure>,
}

enum Outcome {
    Upserted,
    NoData,
    Failed(String),
}

#[derive(Clone)]
pub struct BatchAggregator {
    logs: Arc<dyn GameLogStore>,
    profiles: Arc<dyn ProfileStore>,
    aggregator: SeasonAggregator,
    max_concurrency: usize,
}

impl BatchAggregator {
    pub fn new(
        logs: Arc<dyn GameLogStore>,
        profiles: Arc<dyn ProfileStore>,
        bucketing: TrendBucketing,
        max_concurrency: usize,
    ) -> Self {
        Self {
            aggregator: SeasonAggregator::new(Arc::clone(&logs), bucketing),
            logs,
            profiles,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Rebuild one player-season and store it. `Ok(None)` when the player
    /// has no played games; nothing is written in that case.
    pub fn refresh_one(&self, player_id: PlayerId, season: &str) -> Result<Option<SeasonProfile>> {
        let Some(profile) = self.aggregator.compute_season_profile(player_id, season)? else {
            return Ok(None);
        };
        self.profiles
            .upsert_profile(&profile)
            .with_context(|| format!("failed to store profile for {player_id}/{season}"))?;
        Ok(Some(profile))
    }

    /// Refresh every player-season, optionally limited to one season.
    ///
    /// Only the initial enumeration can fail the whole run; per-pair
    /// failures are collected in the report.
    pub async fn aggregate_all(&self, season: Option<&str>) -> Result<BatchReport> {
        let pairs = {
            let logs = Arc::clone(&self.logs);
            let season = season.map(str::to_string);
            tokio::task::spawn_blocking(move || logs.distinct_player_seasons(season.as_deref()))
                .await
                .context("player-season enumeration task failed")??
        };

        info!(pairs = pairs.len(), season = ?season, "aggregating season profiles");

        let outcomes = stream::iter(pairs)
            .map(|(player_id, season)| {
                let this = self.clone();
                async move {
                    let task_season = season.clone();
                    let outcome =
                        match tokio::task::spawn_blocking(move || this.refresh_one(player_id, &task_season))
                            .await
                        {
                            Ok(Ok(Some(_))) => Outcome::Upserted,
                            Ok(Ok(None)) => Outcome::NoData,
                            Ok(Err(e)) => Outcome::Failed(format!("{e:#}")),
                            Err(e) => Outcome::Failed(format!("aggregation task failed: {e}")),
                        };
                    (player_id, season, outcome)
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut report = BatchReport::default();
        for (player_id, season, outcome) in outcomes {
            report.processed += 1;
            match outcome {
                Outcome::Upserted => report.upserted += 1,
                Outcome::NoData => report.skipped_no_data += 1,
                Outcome::Failed(error) => {
                    warn!(player_id, season = %season, "profile refresh failed: {error}");
                    report.errors.push(BatchFailure {
                        player_id,
                        season,
                        error,
                    });
                }
            }
        }
        report
            .errors
            .sort_by(|a, b| (a.season.as_str(), a.player_id).cmp(&(b.season.as_str(), b.player_id)));

        info!(
            processed = report.processed,
            upserted = report.upserted,
            skipped = report.skipped_no_data,
            failed = report.errors.len(),
            "aggregation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rotation_core::db::Database;
    use rotation_core::model::GameLogRecord;

    fn game(player_id: PlayerId, season: &str, day: u32, minutes: f64, played: bool) -> GameLogRecord {
        GameLogRecord {
            player_id,
            player_name: format!("Player {player_id}"),
            season: season.into(),
            team_id: "DEN".into(),
            team_tricode: "DEN".into(),
            position: "G".into(),
            game_date: NaiveDate::from_ymd_opt(2024, 11, day).unwrap(),
            minutes,
            points: 10.0,
            assists: 2.0,
            rebounds: 3.0,
            steals: 1.0,
            blocks: 0.0,
            turnovers: 1.0,
            fg_pct: Some(45.0),
            three_pct: None,
            ft_pct: Some(80.0),
            plus_minus: 0.0,
            is_home: day % 2 == 0,
            is_back_to_back: false,
            days_rest: 1,
            is_starter: true,
            played,
        }
    }

    fn seeded() -> Arc<Database> {
        let db = Arc::new(Database::open(":memory:").unwrap());
        db.upsert_game_logs(&[
            game(1, "2024-25", 1, 30.0, true),
            game(1, "2024-25", 3, 32.0, true),
            game(2, "2024-25", 1, 18.0, true),
            // DNP-only player-season: enumerated, but no profile.
            game(3, "2024-25", 1, 0.0, false),
            game(1, "2023-24", 2, 28.0, true),
        ])
        .unwrap();
        db
    }

    fn batch(db: &Arc<Database>) -> BatchAggregator {
        BatchAggregator::new(db.clone(), db.clone(), TrendBucketing::Month, 2)
    }

    #[tokio::test]
    async fn aggregates_every_pair() {
        let db = seeded();
        let report = batch(&db).aggregate_all(None).await.unwrap();

        assert_eq!(report.processed, 4);
        assert_eq!(report.upserted, 3);
        assert_eq!(report.skipped_no_data, 1);
        assert!(report.errors.is_empty());
        assert_eq!(db.profile_count().unwrap(), 3);

        let profile = db.load_profile(1, "2024-25").unwrap().unwrap();
        assert_eq!(profile.games_played, 2);
        assert!((profile.season_averages.minutes - 31.0).abs() < 1e-9);
        assert!(db.load_profile(3, "2024-25").unwrap().is_none());
    }

    #[tokio::test]
    async fn season_filter_limits_the_run() {
        let db = seeded();
        let report = batch(&db).aggregate_all(Some("2023-24")).await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.upserted, 1);
        assert!(db.load_profile(1, "2024-25").unwrap().is_none());
        assert!(db.load_profile(1, "2023-24").unwrap().is_some());
    }

    #[tokio::test]
    async fn rerun_replaces_profiles() {
        let db = seeded();
        let runner = batch(&db);
        runner.aggregate_all(None).await.unwrap();

        db.upsert_game_logs(&[game(1, "2024-25", 5, 34.0, true)]).unwrap();
        let report = runner.aggregate_all(None).await.unwrap();

        assert_eq!(report.upserted, 3);
        assert_eq!(db.profile_count().unwrap(), 3);
        let profile = db.load_profile(1, "2024-25").unwrap().unwrap();
        assert_eq!(profile.games_played, 3);
        assert!((profile.season_averages.minutes - 32.0).abs() < 1e-9);
    }

    struct FlakyProfiles {
        inner: Arc<Database>,
        reject: PlayerId,
    }

    impl ProfileStore for FlakyProfiles {
        fn load_profile(&self, player_id: PlayerId, season: &str) -> Result<Option<SeasonProfile>> {
            self.inner.load_profile(player_id, season)
        }

        fn upsert_profile(&self, profile: &SeasonProfile) -> Result<()> {
            if profile.player_id == self.reject {
                anyhow::bail!("write rejected");
            }
            self.inner.upsert_profile(profile)
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let db = seeded();
        let profiles = Arc::new(FlakyProfiles {
            inner: db.clone(),
            reject: 2,
        });
        let runner = BatchAggregator::new(db.clone(), profiles, TrendBucketing::Month, 4);

        let report = runner.aggregate_all(None).await.unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].player_id, 2);
        assert!(report.errors[0].error.contains("write rejected"));
    }

    #[test]
    fn refresh_one_skips_players_without_games() {
        let db = seeded();
        let runner = batch(&db);
        assert!(runner.refresh_one(3, "2024-25").unwrap().is_none());
        assert!(runner.refresh_one(42, "2024-25").unwrap().is_none());
        assert_eq!(db.profile_count().unwrap(), 0);

        let profile = runner.refresh_one(2, "2024-25").unwrap().unwrap();
        assert_eq!(profile.player_id, 2);
        assert_eq!(db.profile_count().unwrap(), 1);
    }
}
