// End-to-end tests: CSV import into SQLite, batch profile aggregation,
// single-player projection, and team rotation projection, all through the
// public crate APIs.

use std::path::Path;
use std::sync::Arc;

use rotation_core::config::{ProjectionPolicy, TrendBucketing};
use rotation_core::db::Database;
use rotation_core::ingest;
use rotation_core::model::GameContext;
use rotation_core::store::{GameLogStore, ProfileStore, RosterProvider};
use rotation_engine::projection::{ConfidenceLevel, ProjectionError, REASON_TEAMMATE_OUT};
use rotation_engine::rotation::RosterStatus;
use rotation_engine::{BatchAggregator, ProjectionEngine, RotationError, RotationProjector};

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory, relative to the crate root (the cwd for `cargo test`).
const FIXTURES: &str = "tests/fixtures";
const SEASON: &str = "2024-25";

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// In-memory database with both fixture files imported.
fn imported_db() -> Arc<Database> {
    let db = Arc::new(Database::open(":memory:").expect("open in-memory db"));

    let logs = ingest::load_game_logs(&Path::new(FIXTURES).join("game_logs.csv"))
        .expect("load game log fixture");
    db.upsert_game_logs(&logs).expect("store game logs");

    let roster = ingest::load_roster(&Path::new(FIXTURES).join("rosters.csv"))
        .expect("load roster fixture");
    db.replace_rosters(&roster).expect("store rosters");

    db
}

/// Imported database with every profile aggregated.
async fn aggregated_db() -> Arc<Database> {
    let db = imported_db();
    BatchAggregator::new(db.clone(), db.clone(), TrendBucketing::Month, 4)
        .aggregate_all(None)
        .await
        .expect("batch aggregation");
    db
}

fn engine(db: &Arc<Database>) -> ProjectionEngine {
    ProjectionEngine::new(db.clone(), ProjectionPolicy::default())
}

// ===========================================================================
// Import
// ===========================================================================

#[test]
fn fixture_import_skips_invalid_rows() {
    let db = imported_db();

    // 26 valid rows (one a DNP); the negative-minutes row is dropped.
    assert_eq!(db.game_log_count().unwrap(), 26);
    assert!(db.load_played_games(6, SEASON).unwrap().is_empty());

    let played = db.load_played_games(1, SEASON).unwrap();
    assert_eq!(played.len(), 15);
    assert!(played.windows(2).all(|w| w[0].game_date < w[1].game_date));

    let roster = db.load_roster("BOS", SEASON).unwrap();
    assert_eq!(roster.len(), 5);
    assert!(roster.iter().any(|p| p.player_id == 4 && p.is_injured));
}

// ===========================================================================
// Aggregation
// ===========================================================================

#[tokio::test]
async fn batch_builds_profiles_for_every_player_season() {
    let db = imported_db();
    let report = BatchAggregator::new(db.clone(), db.clone(), TrendBucketing::Month, 2)
        .aggregate_all(Some(SEASON))
        .await
        .unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.upserted, 4);
    assert_eq!(report.skipped_no_data, 0);
    assert!(report.errors.is_empty());
    assert_eq!(db.profile_count().unwrap(), 4);
}

#[tokio::test]
async fn aggregated_profile_matches_fixture() {
    let db = aggregated_db().await;
    let p = db.load_profile(1, SEASON).unwrap().expect("profile for player 1");

    assert_eq!(p.player_name, "Ava Guard");
    assert_eq!(p.team_id, "BOS");
    assert_eq!(p.games_played, 15);
    assert_eq!(p.games_started, 15);
    assert!(approx(p.starter_rate, 100.0));
    assert!(approx(p.season_averages.minutes, 27.0));

    let last5 = p.rolling.last5.as_ref().unwrap();
    let last10 = p.rolling.last10.as_ref().unwrap();
    assert!(approx(last5.averages.minutes, 30.0));
    assert!(approx(last10.averages.minutes, 28.0));
    assert_eq!(p.rolling.last20.as_ref().unwrap().games_count, 15);

    assert_eq!(p.splits.home.games_count, 8);
    assert_eq!(p.splits.away.games_count, 7);
    assert_eq!(p.splits.back_to_back.games_count, 0);
    assert_eq!(p.splits.rested.games_count, 1);

    let labels: Vec<&str> = p.monthly_trend.iter().map(|t| t.month_label.as_str()).collect();
    assert_eq!(labels, vec!["October", "November"]);
    assert!(approx(p.monthly_trend[0].average_minutes, 25.0));
    assert!(approx(p.monthly_trend[1].average_minutes, 28.0));

    assert!(approx(p.minutes_range.min, 25.0));
    assert!(approx(p.minutes_range.max, 30.0));
    assert!(approx(p.distribution.from20_to30, 66.7));
    assert!(approx(p.distribution.from30_to35, 33.3));
}

// ===========================================================================
// Projection
// ===========================================================================

#[tokio::test]
async fn single_player_projection_scenarios() {
    let db = aggregated_db().await;
    let engine = engine(&db);

    let home = engine
        .project_minutes(1, "BOS", SEASON, &GameContext::new(true, 2))
        .unwrap();
    assert!(approx(home.breakdown.baseline_minutes, 28.8));
    assert!(approx(home.projected_minutes, 29.8));
    // 0.75 tier minus sd(2.16) / 40.
    assert!(approx(home.confidence, 0.696));
    assert_eq!(home.confidence_level, ConfidenceLevel::Medium);

    let b2b = engine
        .project_minutes(1, "BOS", SEASON, &GameContext::new(false, 0))
        .unwrap();
    assert!(approx(b2b.projected_minutes, 25.8));

    let short = engine
        .project_minutes(2, "BOS", SEASON, &GameContext::new(false, 1))
        .unwrap();
    assert!(approx(short.breakdown.baseline_minutes, 23.36));
    assert!(approx(short.projected_minutes, 23.4));
}

#[tokio::test]
async fn player_without_logs_has_insufficient_data() {
    let db = aggregated_db().await;
    let err = engine(&db)
        .project_minutes(5, "BOS", SEASON, &GameContext::default())
        .unwrap_err();
    assert!(matches!(err, ProjectionError::InsufficientData { player_id: 5, .. }));
}

// ===========================================================================
// Team rotation
// ===========================================================================

#[tokio::test]
async fn team_rotation_from_fixtures() {
    let db = aggregated_db().await;
    let projector = RotationProjector::new(engine(&db), db.clone(), 4);

    let team = projector
        .project_team_minutes("BOS", SEASON, &GameContext::new(false, 1))
        .await
        .unwrap();

    let order: Vec<i64> = team.rotation.iter().map(|p| p.player_id).collect();
    assert_eq!(order, vec![1, 2, 3]);
    let minutes: Vec<f64> = team.rotation.iter().map(|p| p.projected_minutes()).collect();
    assert!(approx(minutes[0], 32.8));
    assert!(approx(minutes[1], 27.4));
    assert!(approx(minutes[2], 17.0));

    for player in &team.rotation {
        let projection = player.projection.as_ref().unwrap();
        let bonus: f64 = projection
            .breakdown
            .adjustments
            .iter()
            .filter(|a| a.reason == REASON_TEAMMATE_OUT)
            .map(|a| a.value)
            .sum();
        assert!(approx(bonus, 4.0));
    }

    assert_eq!(team.injured.len(), 1);
    assert_eq!(team.injured[0].player_id, 4);
    assert_eq!(team.injured[0].status, RosterStatus::Injured);

    assert_eq!(team.errors.len(), 1);
    assert_eq!(team.errors[0].player_id, 5);
    assert_eq!(team.errors[0].error.as_deref(), Some("insufficient data"));

    assert_eq!(team.summary.active_players, 3);
    assert_eq!(team.summary.injured_players, 1);
    assert_eq!(team.summary.errored_players, 1);
    assert!(approx(team.summary.total_projected_minutes, 77.2));
}

#[tokio::test]
async fn team_with_no_profiles_reports_errors_only() {
    let db = aggregated_db().await;
    let projector = RotationProjector::new(engine(&db), db.clone(), 4);

    let team = projector
        .project_team_minutes("NYK", SEASON, &GameContext::default())
        .await
        .unwrap();
    assert!(team.rotation.is_empty());
    assert_eq!(team.summary.errored_players, 1);
    assert!(approx(team.summary.total_projected_minutes, 0.0));
    assert!(approx(team.summary.average_confidence, 0.0));
}

#[tokio::test]
async fn unknown_team_is_an_error() {
    let db = aggregated_db().await;
    let projector = RotationProjector::new(engine(&db), db.clone(), 4);

    let err = projector
        .project_team_minutes("LAL", SEASON, &GameContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RotationError::TeamNotFound { .. }));
}

#[tokio::test]
async fn reaggregation_after_new_games_moves_projection() {
    let db = aggregated_db().await;
    let before = engine(&db)
        .project_minutes(3, "BOS", SEASON, &GameContext::new(false, 1))
        .unwrap();
    assert!(approx(before.projected_minutes, 13.0));

    let mut extra = db.load_played_games(3, SEASON).unwrap();
    let mut next = extra.pop().unwrap();
    next.game_date = next.game_date.succ_opt().unwrap().succ_opt().unwrap();
    next.minutes = 22.0;
    db.upsert_game_logs(&[next]).unwrap();

    let batch = BatchAggregator::new(db.clone(), db.clone(), TrendBucketing::Month, 1);
    batch.refresh_one(3, SEASON).unwrap();

    let after = engine(&db)
        .project_minutes(3, "BOS", SEASON, &GameContext::new(false, 1))
        .unwrap();
    // Three games now: short blend of last 3 and season, both 16.0.
    assert!(approx(after.projected_minutes, 16.0));
}
