// core/mod.rs

// Shared state of the navigation stack: geometry primitives, the pose estimate
// and its grid-line corrector, the obstacle flag, the mission phase machine, and
// the periodic worker both background loops run on.

pub mod correction;
pub mod geometry;
pub mod localization;
pub mod ranging;
pub mod state;
pub mod worker;

pub use correction::{Baseline, Correction, LineCrossingCorrector};
pub use geometry::{GridSpacing, Point, TileIndex, Zone};
pub use localization::{Pose, PoseEstimator, TurnSignal};
pub use ranging::{ObstacleSensor, RangeSensingService};
pub use state::{MissionPhase, MissionState, MissionStatus};
pub use worker::Worker;
