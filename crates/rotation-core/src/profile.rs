// Materialized season statistics for one player-season.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::PlayerId;

/// Rolling window sizes, most recent games first.
pub const WINDOW_SIZES: [usize; 5] = [3, 5, 10, 15, 20];

/// Per-game averages for the tracked stat line. All values rounded to two
/// decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatAverages {
    pub minutes: f64,
    pub points: f64,
    pub assists: f64,
    pub rebounds: f64,
    pub steals: f64,
    pub blocks: f64,
    pub turnovers: f64,
    pub fg_pct: f64,
    pub three_pct: f64,
    pub ft_pct: f64,
    pub plus_minus: f64,
}

/// Averages over the N most recent played games.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub games_count: usize,
    pub averages: StatAverages,
    pub minutes_std_dev: f64,
}

/// The five rolling windows. A window is `None` when it holds no games.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingWindows {
    pub last3: Option<WindowStats>,
    pub last5: Option<WindowStats>,
    pub last10: Option<WindowStats>,
    pub last15: Option<WindowStats>,
    pub last20: Option<WindowStats>,
}

impl RollingWindows {
    pub fn get(&self, size: usize) -> Option<&WindowStats> {
        match size {
            3 => self.last3.as_ref(),
            5 => self.last5.as_ref(),
            10 => self.last10.as_ref(),
            15 => self.last15.as_ref(),
            20 => self.last20.as_ref(),
            _ => None,
        }
    }

    pub fn set(&mut self, size: usize, window: Option<WindowStats>) {
        match size {
            3 => self.last3 = window,
            5 => self.last5 = window,
            10 => self.last10 = window,
            15 => self.last15 = window,
            20 => self.last20 = window,
            _ => {}
        }
    }
}

/// Averages over a subset of games sharing a contextual trait. Zero-filled
/// when the subset is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitStats {
    pub games_count: usize,
    pub avg_minutes: f64,
    pub avg_points: f64,
}

/// Contextual splits. The predicates overlap: one game can count towards
/// `away` and `rested` at the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Splits {
    pub home: SplitStats,
    pub away: SplitStats,
    pub back_to_back: SplitStats,
    pub rested: SplitStats,
    pub starter: SplitStats,
    pub bench: SplitStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrend {
    pub month_label: String,
    pub games_count: usize,
    pub average_minutes: f64,
}

/// Share of played games (percent, one decimal) per minutes bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinutesDistribution {
    pub under20: f64,
    pub from20_to30: f64,
    pub from30_to35: f64,
    pub over35: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinutesRange {
    pub min: f64,
    pub max: f64,
}

/// Fully derived season profile. Recomputing it from the same game log set
/// yields the same value apart from `last_calculated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonProfile {
    pub player_id: PlayerId,
    pub player_name: String,
    pub season: String,
    pub team_id: String,
    pub season_averages: StatAverages,
    pub games_played: usize,
    pub games_started: usize,
    pub starter_rate: f64,
    pub rolling: RollingWindows,
    pub splits: Splits,
    pub monthly_trend: Vec<MonthlyTrend>,
    pub minutes_std_dev: f64,
    pub minutes_range: MinutesRange,
    pub distribution: MinutesDistribution,
    pub last_calculated: DateTime<Utc>,
    pub games_processed: usize,
}

impl SeasonProfile {
    /// Minutes over the last `size` games, falling back to the season
    /// average when that window is absent.
    pub fn window_minutes_or_season(&self, size: usize) -> f64 {
        self.rolling
            .get(size)
            .map(|w| w.averages.minutes)
            .unwrap_or(self.season_averages.minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(minutes: f64) -> WindowStats {
        WindowStats {
            games_count: 3,
            averages: StatAverages {
                minutes,
                ..StatAverages::default()
            },
            minutes_std_dev: 0.0,
        }
    }

    #[test]
    fn rolling_get_and_set_by_size() {
        let mut rolling = RollingWindows::default();
        for size in WINDOW_SIZES {
            assert!(rolling.get(size).is_none());
            rolling.set(size, Some(window(size as f64)));
        }
        assert_eq!(rolling.get(10).map(|w| w.averages.minutes), Some(10.0));
        assert!(rolling.get(7).is_none());
    }

    #[test]
    fn profile_json_uses_camel_case_and_null_windows() {
        let profile = SeasonProfile {
            player_id: 7,
            player_name: "Test Wing".into(),
            season: "2024-25".into(),
            team_id: "T1".into(),
            season_averages: StatAverages::default(),
            games_played: 1,
            games_started: 0,
            starter_rate: 0.0,
            rolling: RollingWindows {
                last3: Some(window(12.0)),
                ..RollingWindows::default()
            },
            splits: Splits::default(),
            monthly_trend: vec![],
            minutes_std_dev: 0.0,
            minutes_range: MinutesRange::default(),
            distribution: MinutesDistribution::default(),
            last_calculated: Utc::now(),
            games_processed: 1,
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["gamesPlayed"], 1);
        assert!(value["rolling"]["last5"].is_null());
        assert_eq!(value["rolling"]["last3"]["gamesCount"], 3);
        assert_eq!(value["splits"]["backToBack"]["gamesCount"], 0);

        let back: SeasonProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back, profile);
        assert_eq!(back.window_minutes_or_season(3), 12.0);
        assert_eq!(back.window_minutes_or_season(5), 0.0);
    }
}
