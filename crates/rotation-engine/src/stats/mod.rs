// Season statistics: windowed aggregation, splits, trend, and variability.

pub mod aggregate;
pub mod math;

pub use aggregate::{compute_season_profile, SeasonAggregator};
