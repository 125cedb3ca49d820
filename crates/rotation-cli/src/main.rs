// Minutes projection CLI.
//
// Every command prints a single JSON object to stdout with a `success`
// flag. Logs go to logs/rotation.log so stdout stays machine-readable.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use rotation_core::config::{self, Config};
use rotation_core::db::Database;
use rotation_core::ingest;
use rotation_core::store::ProfileStore;
use rotation_engine::{BatchAggregator, ProjectionEngine, RotationProjector};

use cli::{Cli, Commands};

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

fn success<T: Serialize>(data: T) -> anyhow::Result<Value> {
    serde_json::to_value(Envelope {
        success: true,
        data,
    })
    .context("failed to serialize result")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    match run(cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!("command failed: {e:#}");
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "success": false, "error": format!("{e:#}") }))?
            );
            std::process::exit(1);
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<Value> {
    let config = config::load_config().context("failed to load configuration")?;
    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    match command {
        Commands::ImportLogs { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(&config.data_paths.game_logs));
            let records = ingest::load_game_logs(&path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            let imported = db.upsert_game_logs(&records)?;
            info!("Imported {imported} game log rows from {}", path.display());
            success(json!({ "imported": imported, "totalGameLogs": db.game_log_count()? }))
        }

        Commands::ImportRoster { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(&config.data_paths.rosters));
            let entries = ingest::load_roster(&path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            let imported = db.replace_rosters(&entries)?;
            info!("Imported {imported} roster entries from {}", path.display());
            success(json!({ "imported": imported }))
        }

        Commands::Aggregate { season, player } => {
            let batch = batch_aggregator(&config, &db);
            match (player, season) {
                (Some(player_id), Some(season)) => {
                    let profile = batch.refresh_one(player_id, &season)?;
                    success(json!({ "updated": profile.is_some(), "profile": profile }))
                }
                (_, season) => {
                    let report = batch.aggregate_all(season.as_deref()).await?;
                    success(json!({ "report": report }))
                }
            }
        }

        Commands::Profile { player, season } => {
            let profile = db
                .load_profile(player, &season)?
                .ok_or_else(|| anyhow!("no profile for player {player} in {season}"))?;
            success(json!({ "profile": profile }))
        }

        Commands::Project {
            player,
            team,
            season,
            game,
        } => {
            let engine = ProjectionEngine::new(db, config.projection.clone());
            let projection = engine.project_minutes(player, &team, &season, &game.to_context())?;
            success(json!({ "projection": projection }))
        }

        Commands::Team { team, season, game } => {
            let engine = ProjectionEngine::new(db.clone(), config.projection.clone());
            let projector = RotationProjector::new(engine, db, config.rotation.max_concurrency);
            let result = projector
                .project_team_minutes(&team, &season, &game.to_context())
                .await?;
            success(result)
        }
    }
}

fn batch_aggregator(config: &Config, db: &Arc<Database>) -> BatchAggregator {
    BatchAggregator::new(
        db.clone(),
        db.clone(),
        config.aggregation.trend_bucketing,
        config.aggregation.max_concurrency,
    )
}

/// Initialize tracing to log to a file (stdout carries the JSON output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::options()
        .create(true)
        .append(true)
        .open(log_dir.join("rotation.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rotation=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
