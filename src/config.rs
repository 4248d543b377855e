// src/config.rs
// YAML configuration for the whole stack. Every section falls back to the values
// measured on the competition robot, so a partial file only overrides what it names.

use crate::GridflagError;
use crate::devices::sim::SimConfig;
use crate::mission::MissionParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Gridflag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridflagConfig {
    /// Arena layout
    pub arena: ArenaConfig,
    /// Drive geometry, speeds and tolerances
    pub robot: RobotConfig,
    /// Grid-line odometry correction
    pub correction: CorrectionConfig,
    /// Forward obstacle polling
    pub ranging: RangingConfig,
    /// Rectilinear router
    pub pathfinder: PathfinderConfig,
    /// Search zone sweep and pickup
    pub search: SearchConfig,
    /// Simulated arena used by the demo binary and the integration tests
    pub sim: SimConfig,
    /// Mission parameters, when supplied in the same file
    pub mission: Option<MissionParams>,
}

/// Arena layout constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Distance between ruled grid lines
    pub grid_spacing: f64,
    /// Footprint margin added around the exclusion tile
    pub exclusion_margin: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            grid_spacing: 30.3,
            exclusion_margin: 5.0,
        }
    }
}

/// Drive geometry and motion tolerances
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Wheel radius, same unit as the grid spacing
    pub wheel_radius: f64,
    /// Distance between the wheel contact points
    pub track_width: f64,
    /// Rotate-in-place speed (wheel degrees per second)
    pub slow_speed: f64,
    /// Straight travel speed (wheel degrees per second)
    pub mid_speed: f64,
    /// Fast open-loop speed (wheel degrees per second)
    pub fast_speed: f64,
    /// Heading error accepted by `turn_to` (degrees)
    pub heading_tolerance: f64,
    /// Position error accepted by `travel_to`
    pub position_tolerance: f64,
    /// Re-turn attempts toward a bearing before driving
    pub max_turn_retries: u32,
    /// Drive attempts made by `travel_to` before giving up
    pub max_travel_attempts: u32,
    /// Polling period of the blocking primitives (milliseconds)
    pub poll_period_ms: u64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            wheel_radius: 2.1,
            track_width: 17.25,
            slow_speed: 150.0,
            mid_speed: 250.0,
            fast_speed: 300.0,
            heading_tolerance: 5.0,
            position_tolerance: 1.0,
            max_turn_retries: 10,
            max_travel_attempts: 2,
            poll_period_ms: 20,
        }
    }
}

/// Grid-line correction loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Run the correction loop during missions
    pub enabled: bool,
    /// Loop period (milliseconds)
    pub period_ms: u64,
    /// Samples averaged for the ambient baseline
    pub calibration_samples: u32,
    /// Delay between calibration samples (milliseconds)
    pub calibration_delay_ms: u64,
    /// Fraction of the left baseline below which a line is seen
    pub left_threshold: f64,
    /// Fraction of the right baseline below which a line is seen
    pub right_threshold: f64,
    /// Sensor offset along the heading from the rotation center (negative is behind)
    pub forward_offset: f64,
    /// Sensor offset across the heading; left sensor at `+`, right at `-`
    pub lateral_offset: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        CorrectionConfig {
            enabled: true,
            period_ms: 10,
            calibration_samples: 20,
            calibration_delay_ms: 10,
            left_threshold: 0.85,
            right_threshold: 0.87,
            forward_offset: -7.3,
            lateral_offset: 7.3,
        }
    }
}

/// Obstacle polling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangingConfig {
    /// Loop period (milliseconds)
    pub period_ms: u64,
    /// Readings at or under this raise the obstacle flag
    pub obstacle_threshold: f64,
    /// Readings at or beyond this are treated as no echo
    pub max_detection_distance: f64,
    /// Consecutive close samples required before the flag is raised
    pub debounce_samples: u32,
}

impl Default for RangingConfig {
    fn default() -> Self {
        RangingConfig {
            period_ms: 20,
            obstacle_threshold: 20.0,
            max_detection_distance: 255.0,
            debounce_samples: 2,
        }
    }
}

/// Pathfinder parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Distance to the destination counted as arrival
    pub arrival_tolerance: f64,
    /// Travel between checkpoints
    pub checkpoint_interval: f64,
    /// Checkpoints closer than this to a dead end are skipped
    pub min_recovery_distance: f64,
    /// How far past the destination coordinate a positive leg aims
    pub axis_overshoot: f64,
    /// Sensor settle time after a direction change (milliseconds)
    pub settle_ms: u64,
    /// Duration of the reverse maneuver out of the exclusion zone (milliseconds)
    pub escape_ms: u64,
    /// Wheel speed of the reverse maneuver
    pub escape_speed: f64,
    /// Legs attempted before navigation is declared failed
    pub max_legs: usize,
    /// Backtracks attempted before navigation is declared failed
    pub max_backtracks: usize,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        PathfinderConfig {
            arrival_tolerance: 3.0,
            checkpoint_interval: 15.0,
            min_recovery_distance: 20.0,
            axis_overshoot: 8.0,
            settle_ms: 1000,
            escape_ms: 1000,
            escape_speed: 150.0,
            max_legs: 400,
            max_backtracks: 25,
        }
    }
}

impl PathfinderConfig {
    /// Length of a leg against the bias
    pub fn reverse_leg(&self) -> f64 {
        2.0 * self.checkpoint_interval
    }
}

/// Search and pickup parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Inset of the first scan origin from the zone's near edge
    pub zone_margin: f64,
    /// Sweep increment (degrees)
    pub sweep_step: f64,
    /// Extra rotation after a hit to square up to the object (degrees)
    pub refine_angle: f64,
    /// Scan origin advance between cycles
    pub offset_step: f64,
    /// Single-shot reading at which the object is in pickup range
    pub pickup_distance: f64,
    /// Approach travel from the scan origin after which the hit is dropped
    pub max_travel_distance: f64,
    /// Clearance both sensors need before turning around
    pub turn_clearance: f64,
    /// Reverse travel onto a matching object before gripping
    pub grab_backoff: f64,
    /// Reverse travel onto a rejected object before gripping
    pub reject_backoff: f64,
    /// Creep speed of the approach and back-off
    pub approach_speed: f64,
    /// Speed of the reverse travel onto the object
    pub grab_speed: f64,
    /// Extra creep after pickup range and back-off settle (milliseconds)
    pub settle_ms: u64,
    /// Sweep passes over the zone before giving up (forward then reverse)
    pub max_passes: u32,
    /// Gripper angle when open
    pub gripper_open: f64,
    /// Gripper angle when closed on an object
    pub gripper_closed: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            zone_margin: 7.0,
            sweep_step: 7.0,
            refine_angle: 12.0,
            offset_step: 20.0,
            pickup_distance: 7.0,
            max_travel_distance: 40.0,
            turn_clearance: 9.0,
            grab_backoff: 20.0,
            reject_backoff: 15.0,
            approach_speed: 150.0,
            grab_speed: 120.0,
            settle_ms: 500,
            max_passes: 2,
            gripper_open: 0.0,
            gripper_closed: -200.0,
        }
    }
}

impl GridflagConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GridflagError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GridflagError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, GridflagError> {
        let config: GridflagConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the control loops cannot run with
    pub fn validate(&self) -> Result<(), GridflagError> {
        let positive = [
            ("arena.grid_spacing", self.arena.grid_spacing),
            ("robot.wheel_radius", self.robot.wheel_radius),
            ("robot.track_width", self.robot.track_width),
            ("robot.mid_speed", self.robot.mid_speed),
            ("robot.slow_speed", self.robot.slow_speed),
            ("pathfinder.checkpoint_interval", self.pathfinder.checkpoint_interval),
            ("search.sweep_step", self.search.sweep_step),
            ("search.offset_step", self.search.offset_step),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(GridflagError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        let counts = [
            ("robot.poll_period_ms", self.robot.poll_period_ms),
            ("robot.max_turn_retries", u64::from(self.robot.max_turn_retries)),
            ("robot.max_travel_attempts", u64::from(self.robot.max_travel_attempts)),
            ("correction.period_ms", self.correction.period_ms),
            ("correction.calibration_samples", u64::from(self.correction.calibration_samples)),
            ("ranging.period_ms", self.ranging.period_ms),
            ("ranging.debounce_samples", u64::from(self.ranging.debounce_samples)),
            ("search.max_passes", u64::from(self.search.max_passes)),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(GridflagError::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}
