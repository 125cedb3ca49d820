// Configuration loading and parsing (config/rotation.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the single config file under `config/`.
pub const CONFIG_FILE: &str = "rotation.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub data_paths: DataPaths,
    pub aggregation: AggregationConfig,
    pub projection: ProjectionPolicy,
    pub rotation: RotationConfig,
}

/// Raw deserialization target for the entire rotation.toml file.
#[derive(Debug, Clone, Deserialize)]
struct RotationFile {
    database: DatabaseSection,
    data_paths: DataPaths,
    #[serde(default)]
    aggregation: AggregationConfig,
    #[serde(default)]
    projection: ProjectionPolicy,
    #[serde(default)]
    rotation: RotationConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub game_logs: String,
    pub rosters: String,
}

// ---------------------------------------------------------------------------
// [aggregation]
// ---------------------------------------------------------------------------

/// How the monthly trend groups games.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBucketing {
    /// Calendar month name only; the same month in different years shares
    /// one bucket.
    #[default]
    Month,
    /// Calendar month within its year ("October 2024").
    YearMonth,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub trend_bucketing: TrendBucketing,
    pub max_concurrency: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            trend_bucketing: TrendBucketing::Month,
            max_concurrency: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// [projection] policy table
// ---------------------------------------------------------------------------

/// Baseline blend once a player has a full recent sample.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecentBlend {
    pub last5: f64,
    pub last10: f64,
    pub season: f64,
}

/// Baseline blend for a short sample.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ShortBlend {
    pub last3: f64,
    pub season: f64,
}

/// Base confidence for players with at least `min_games` played.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConfidenceTier {
    pub min_games: usize,
    pub score: f64,
}

/// Every coefficient the minutes projection uses. Tunable from config;
/// `Default` holds the stock rule set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectionPolicy {
    pub recent_blend: RecentBlend,
    pub recent_min_games: usize,
    pub short_blend: ShortBlend,
    pub short_min_games: usize,
    pub back_to_back_adjustment: f64,
    pub extended_rest_days: u32,
    pub extended_rest_adjustment: f64,
    pub home_adjustment: f64,
    pub injury_adjustment_per_teammate: f64,
    pub injury_adjustment_cap: f64,
    pub max_minutes: f64,
    /// Checked in descending `min_games` order; the first match wins.
    pub confidence_tiers: Vec<ConfidenceTier>,
    pub volatility_divisor: f64,
    pub volatility_penalty_cap: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub high_confidence: f64,
    pub medium_confidence: f64,
}

impl Default for ProjectionPolicy {
    fn default() -> Self {
        Self {
            recent_blend: RecentBlend {
                last5: 0.5,
                last10: 0.3,
                season: 0.2,
            },
            recent_min_games: 10,
            short_blend: ShortBlend {
                last3: 0.6,
                season: 0.4,
            },
            short_min_games: 3,
            back_to_back_adjustment: -3.0,
            extended_rest_days: 3,
            extended_rest_adjustment: 1.5,
            home_adjustment: 1.0,
            injury_adjustment_per_teammate: 4.0,
            injury_adjustment_cap: 10.0,
            max_minutes: 48.0,
            confidence_tiers: vec![
                ConfidenceTier { min_games: 20, score: 0.90 },
                ConfidenceTier { min_games: 10, score: 0.75 },
                ConfidenceTier { min_games: 3, score: 0.55 },
                ConfidenceTier { min_games: 0, score: 0.30 },
            ],
            volatility_divisor: 40.0,
            volatility_penalty_cap: 0.30,
            confidence_floor: 0.05,
            confidence_ceiling: 0.95,
            high_confidence: 0.75,
            medium_confidence: 0.50,
        }
    }
}

// ---------------------------------------------------------------------------
// [rotation]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Upper bound on per-player projections running at once.
    pub max_concurrency: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/rotation.toml` relative to
/// `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: RotationFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        db_path: file.database.path,
        data_paths: file.data_paths,
        aggregation: file.aggregation,
        projection: file.projection,
        rotation: file.rotation,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.aggregation.max_concurrency == 0 {
        return Err(invalid("aggregation.max_concurrency", "must be > 0".into()));
    }
    if config.rotation.max_concurrency == 0 {
        return Err(invalid("rotation.max_concurrency", "must be > 0".into()));
    }
    validate_policy(&config.projection)
}

/// Check a projection policy for internal consistency. Exposed so callers
/// building a policy in code can run the same checks.
pub fn validate_policy(p: &ProjectionPolicy) -> Result<(), ConfigError> {
    let blends: &[(&str, &[f64])] = &[
        (
            "projection.recent_blend",
            &[p.recent_blend.last5, p.recent_blend.last10, p.recent_blend.season][..],
        ),
        (
            "projection.short_blend",
            &[p.short_blend.last3, p.short_blend.season][..],
        ),
    ];
    for (name, weights) in blends {
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(invalid(name, "weights must be finite and >= 0".into()));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(name, format!("weights must sum to 1.0, got {sum}")));
        }
    }

    let scalars: &[(&str, f64)] = &[
        ("projection.back_to_back_adjustment", p.back_to_back_adjustment),
        ("projection.extended_rest_adjustment", p.extended_rest_adjustment),
        ("projection.home_adjustment", p.home_adjustment),
        ("projection.injury_adjustment_per_teammate", p.injury_adjustment_per_teammate),
        ("projection.injury_adjustment_cap", p.injury_adjustment_cap),
        ("projection.max_minutes", p.max_minutes),
        ("projection.volatility_divisor", p.volatility_divisor),
        ("projection.volatility_penalty_cap", p.volatility_penalty_cap),
        ("projection.confidence_floor", p.confidence_floor),
        ("projection.confidence_ceiling", p.confidence_ceiling),
        ("projection.high_confidence", p.high_confidence),
        ("projection.medium_confidence", p.medium_confidence),
    ];
    for (name, val) in scalars {
        if !val.is_finite() {
            return Err(invalid(name, format!("must be finite, got {val}")));
        }
    }
    if let Some(t) = p.confidence_tiers.iter().find(|t| !t.score.is_finite()) {
        return Err(invalid(
            "projection.confidence_tiers",
            format!("score must be finite, got {}", t.score),
        ));
    }

    if p.short_min_games > p.recent_min_games {
        return Err(invalid(
            "projection.short_min_games",
            format!(
                "must not exceed recent_min_games ({}), got {}",
                p.recent_min_games, p.short_min_games
            ),
        ));
    }

    if p.max_minutes <= 0.0 {
        return Err(invalid(
            "projection.max_minutes",
            format!("must be > 0, got {}", p.max_minutes),
        ));
    }

    if p.injury_adjustment_cap < 0.0 {
        return Err(invalid(
            "projection.injury_adjustment_cap",
            format!("must be >= 0, got {}", p.injury_adjustment_cap),
        ));
    }

    if p.volatility_divisor <= 0.0 {
        return Err(invalid(
            "projection.volatility_divisor",
            format!("must be > 0, got {}", p.volatility_divisor),
        ));
    }

    let unit_fields: &[(&str, f64)] = &[
        ("projection.confidence_floor", p.confidence_floor),
        ("projection.confidence_ceiling", p.confidence_ceiling),
        ("projection.high_confidence", p.high_confidence),
        ("projection.medium_confidence", p.medium_confidence),
        ("projection.volatility_penalty_cap", p.volatility_penalty_cap),
    ];
    for (name, val) in unit_fields {
        if !(0.0..=1.0).contains(val) {
            return Err(invalid(
                name,
                format!("must be between 0.0 and 1.0 inclusive, got {val}"),
            ));
        }
    }

    if p.confidence_floor > p.confidence_ceiling {
        return Err(invalid(
            "projection.confidence_floor",
            format!(
                "must not exceed confidence_ceiling ({}), got {}",
                p.confidence_ceiling, p.confidence_floor
            ),
        ));
    }

    if p.medium_confidence > p.high_confidence {
        return Err(invalid(
            "projection.medium_confidence",
            format!(
                "must not exceed high_confidence ({}), got {}",
                p.high_confidence, p.medium_confidence
            ),
        ));
    }

    if !p.confidence_tiers.iter().any(|t| t.min_games == 0) {
        return Err(invalid(
            "projection.confidence_tiers",
            "must include a tier with min_games = 0".into(),
        ));
    }
    for tier in &p.confidence_tiers {
        if !(0.0..=1.0).contains(&tier.score) {
            return Err(invalid(
                "projection.confidence_tiers",
                format!("score must be between 0.0 and 1.0, got {}", tier.score),
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
