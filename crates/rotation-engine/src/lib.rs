pub mod batch;
pub mod projection;
pub mod rotation;
pub mod stats;

pub use batch::{BatchAggregator, BatchReport};
pub use projection::{MinutesProjection, ProjectionEngine, ProjectionError};
pub use rotation::{RotationError, RotationProjector, TeamProjection};
pub use stats::SeasonAggregator;
