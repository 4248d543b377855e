//! Navigation system for Gridflag
//!
//! This module handles motion primitives, rectilinear routing around unknown
//! obstacles, and re-deriving the coordinate frame so that every route runs
//! toward increasing coordinates.

pub mod controller;
pub mod planner;
pub mod reframe;

pub use controller::{Completion, DriveOutcome, MotionController, TravelOutcome};
pub use planner::{Backtrack, CheckpointStack, Direction, PathReport, PathState, Pathfinder};
pub use reframe::{CanonicalFrame, CoordinateReframer, Quadrant, Reframing};

use crate::core::geometry::Point;

/// Navigation error types
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// Blocked with no checkpoint far enough away to retreat to
    CheckpointsExhausted {
        /// Position where the last block happened
        at: Point,
    },
    /// Too many legs without arriving
    LegBudgetExhausted {
        /// Legs driven
        legs: usize,
    },
    /// Too many retreats without arriving
    BacktrackBudgetExhausted {
        /// Retreats made
        backtracks: usize,
    },
    /// A point-to-point move stayed outside tolerance after every attempt
    NotConverged {
        /// Target of the move
        target: Point,
        /// Remaining distance
        error: f64,
    },
}

impl std::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NavigationError::CheckpointsExhausted { at } => write!(
                f,
                "Checkpoints exhausted while blocked at ({:.1}, {:.1})",
                at.x, at.y
            ),
            NavigationError::LegBudgetExhausted { legs } => {
                write!(f, "Gave up after {} legs", legs)
            }
            NavigationError::BacktrackBudgetExhausted { backtracks } => {
                write!(f, "Gave up after {} backtracks", backtracks)
            }
            NavigationError::NotConverged { target, error } => write!(
                f,
                "Could not reach ({:.1}, {:.1}), {:.1} away",
                target.x, target.y, error
            ),
        }
    }
}

impl std::error::Error for NavigationError {}
