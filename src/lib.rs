//! Gridflag - grid-arena retrieval robot
//!
//! This library drives a differential-drive robot across a ruled grid arena using
//! dead reckoning corrected by grid-line crossings. It routes around unknown obstacles
//! with a rectilinear bias-switching pathfinder, sweeps a search zone for a colored
//! object, carries it out, and delivers it to a drop rectangle.
//!
//! The hardware is reached only through the capability traits in [`devices`]; a
//! simulated arena implementing all of them lives in [`devices::sim`].

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod core;
pub mod devices;
pub mod mission;
pub mod navigation;
pub mod search;

// Re-export commonly used items for easier access
pub use config::GridflagConfig;
pub use crate::core::{
    GridSpacing, LineCrossingCorrector, MissionPhase, ObstacleSensor, Point, Pose, PoseEstimator,
    RangeSensingService, Zone,
};
pub use devices::{ColorClassifier, ColorId, Drive, Gripper, LightSensors, RangeSensors, Side};
pub use mission::{Devices, MissionOrchestrator, MissionParams, MissionReport};
pub use navigation::{CoordinateReframer, MotionController, NavigationError, Pathfinder};
pub use search::{SearchAndAcquire, SearchOutcome};

/// Gridflag error types
#[derive(Debug)]
pub enum GridflagError {
    /// Configuration could not be read or parsed
    Config(String),
    /// Pathfinder gave up before reaching its destination
    Navigation(NavigationError),
    /// Search covered the whole zone in both directions without a match
    SearchExhausted {
        /// Number of scan cycles run
        scans: usize,
        /// Number of non-matching objects moved out of the zone
        rejected: usize,
    },
    /// A background loop could not be spawned or panicked
    Worker(String),
    /// Mission started before `initialize`
    NotInitialized,
}

impl std::fmt::Display for GridflagError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GridflagError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GridflagError::Navigation(err) => write!(f, "Navigation error: {}", err),
            GridflagError::SearchExhausted { scans, rejected } => write!(
                f,
                "Search zone exhausted after {} scans ({} objects rejected)",
                scans, rejected
            ),
            GridflagError::Worker(msg) => write!(f, "Worker error: {}", msg),
            GridflagError::NotInitialized => write!(f, "System not initialized"),
        }
    }
}

impl std::error::Error for GridflagError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridflagError::Navigation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NavigationError> for GridflagError {
    fn from(err: NavigationError) -> Self {
        GridflagError::Navigation(err)
    }
}

impl From<serde_yaml::Error> for GridflagError {
    fn from(err: serde_yaml::Error) -> Self {
        GridflagError::Config(err.to_string())
    }
}

impl From<std::io::Error> for GridflagError {
    fn from(err: std::io::Error) -> Self {
        GridflagError::Config(err.to_string())
    }
}
