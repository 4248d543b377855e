//! Simulated arena
//!
//! Implements every capability trait over one shared [`physics`] state, so the
//! pathfinder, the search routine and a whole mission can run without a robot.
//! Time only moves when the control thread calls [`Drive::wait`]; with a
//! nonzero `time_scale` each simulated step also sleeps, which gives background
//! loops real time to observe the motion.

mod physics;

use self::physics::{SimState, WheelCommand};
use crate::{GridflagConfig, GridflagError};
use crate::core::geometry::{GridSpacing, Point, Zone};
use crate::core::localization::Pose;
use crate::core::ranging::ObstacleSensor;
use crate::devices::{ColorClassifier, ColorId, Drive, Gripper, LightSensors, RangeSensors, Side};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Colored block placed in the simulated arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    /// Center X
    pub x: f64,
    /// Center Y
    pub y: f64,
    /// Color reported by the classifier
    pub color: ColorId,
    /// Side length of the square footprint
    #[serde(default = "default_block_size")]
    pub size: f64,
}

fn default_block_size() -> f64 {
    6.0
}

/// Simulated arena layout and sensor geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Outer walls
    pub arena: Zone,
    /// Solid rectangles the robot cannot drive through
    pub obstacles: Vec<Zone>,
    /// Blocks the robot can detect, classify and carry
    pub blocks: Vec<BlockSpec>,
    /// True starting pose
    pub start: Pose,
    /// Collision radius of the robot body
    pub robot_radius: f64,
    /// Range sensor offset ahead of the rotation center
    pub range_forward: f64,
    /// Range sensor offset to each side
    pub range_lateral: f64,
    /// Half-width of each range sensor's beam (degrees)
    pub cone_half_angle: f64,
    /// Rays cast across each beam
    pub cone_rays: usize,
    /// Reading reported when nothing echoes
    pub max_range: f64,
    /// Light sensor offset along the heading (negative is behind)
    pub light_forward: f64,
    /// Light sensor offset to each side
    pub light_lateral: f64,
    /// Width of a ruled line
    pub line_width: f64,
    /// Light reading over bare floor
    pub light_ambient: f64,
    /// Light reading over a line
    pub light_line: f64,
    /// How far past the body the classifier sees
    pub classify_reach: f64,
    /// Distance from the center within which closed jaws catch a block
    pub grab_reach: f64,
    /// Jaw angle at or below which a jaw counts as closed
    pub grip_angle: f64,
    /// Physics step (milliseconds)
    pub step_ms: u64,
    /// Real seconds slept per simulated second; 0 runs as fast as possible
    pub time_scale: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            arena: Zone {
                x_min: -30.0,
                y_min: -30.0,
                x_max: 330.0,
                y_max: 330.0,
            },
            obstacles: Vec::new(),
            blocks: Vec::new(),
            start: Pose::origin(),
            robot_radius: 9.0,
            range_forward: 5.0,
            range_lateral: 4.0,
            cone_half_angle: 12.0,
            cone_rays: 5,
            max_range: 255.0,
            light_forward: -7.3,
            light_lateral: 7.3,
            line_width: 1.0,
            light_ambient: 500.0,
            light_line: 380.0,
            classify_reach: 15.0,
            grab_reach: 25.0,
            grip_angle: -100.0,
            step_ms: 5,
            time_scale: 0.0,
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared simulated world; hands out device handles that all act on it
#[derive(Clone)]
pub struct SimArena {
    state: Arc<Mutex<SimState>>,
}

impl SimArena {
    /// Builds the arena described by `config.sim` with the robot's drive geometry
    pub fn new(config: &GridflagConfig) -> Self {
        let state = SimState::new(
            config.sim.clone(),
            config.robot.wheel_radius,
            config.robot.track_width,
            GridSpacing::new(config.arena.grid_spacing),
        );
        log::info!(
            "Simulated arena: {} obstacles, {} blocks, start ({:.1}, {:.1}, {:.0})",
            config.sim.obstacles.len(),
            config.sim.blocks.len(),
            config.sim.start.x,
            config.sim.start.y,
            config.sim.start.heading
        );
        SimArena {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Drive handle for the control thread
    pub fn drive(&self) -> SimDrive {
        let state = lock(&self.state);
        SimDrive {
            state: Arc::clone(&self.state),
            step: Duration::from_millis(state.config.step_ms.max(1)),
            time_scale: state.config.time_scale,
        }
    }

    /// Sensor and gripper handle implementing every sensing trait
    pub fn sensors(&self) -> Arc<SimSensors> {
        Arc::new(SimSensors {
            state: Arc::clone(&self.state),
        })
    }

    /// Obstacle flag sampled on demand from the control thread
    pub fn obstacle_probe(&self, threshold: f64) -> SimObstacleProbe {
        SimObstacleProbe {
            state: Arc::clone(&self.state),
            threshold,
            latched: AtomicBool::new(false),
        }
    }

    /// Ground-truth pose
    pub fn true_pose(&self) -> Pose {
        let state = lock(&self.state);
        Pose::new(state.pose.x, state.pose.y, state.heading())
    }

    /// Positions and colors of every block not being carried
    pub fn blocks(&self) -> Vec<(Point, ColorId)> {
        let state = lock(&self.state);
        state
            .blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| state.carried != Some(*i))
            .map(|(_, b)| (b.position, b.color))
            .collect()
    }

    /// Color of the block in the gripper
    pub fn carried(&self) -> Option<ColorId> {
        let state = lock(&self.state);
        state.carried.map(|i| state.blocks[i].color)
    }

    /// Simulated time elapsed
    pub fn clock(&self) -> Duration {
        lock(&self.state).clock
    }

    /// Steps rejected because the robot would have hit something
    pub fn collisions(&self) -> usize {
        lock(&self.state).collisions
    }
}

/// Simulated differential drive
pub struct SimDrive {
    state: Arc<Mutex<SimState>>,
    step: Duration,
    time_scale: f64,
}

impl Drive for SimDrive {
    fn set_speeds(&mut self, left: f64, right: f64) {
        lock(&self.state).command = if left == 0.0 && right == 0.0 {
            WheelCommand::Idle
        } else {
            WheelCommand::Speed { left, right }
        };
    }

    fn rotate(&mut self, left_degrees: f64, right_degrees: f64, speed: f64) {
        lock(&self.state).command = if left_degrees == 0.0 && right_degrees == 0.0 {
            WheelCommand::Idle
        } else {
            WheelCommand::Rotate {
                left: left_degrees,
                right: right_degrees,
                speed,
            }
        };
    }

    fn stop(&mut self) {
        lock(&self.state).command = WheelCommand::Idle;
    }

    fn is_moving(&self) -> bool {
        lock(&self.state).command != WheelCommand::Idle
    }

    fn tachometers(&self) -> (f64, f64) {
        lock(&self.state).tacho
    }

    fn wait(&mut self, duration: Duration) {
        let steps = duration.as_nanos().div_ceil(self.step.as_nanos()).max(1);
        for _ in 0..steps {
            lock(&self.state).step(self.step);
            if self.time_scale > 0.0 {
                thread::sleep(self.step.mul_f64(self.time_scale));
            }
        }
    }
}

/// Range sensors, light sensors, classifier and gripper of the simulated robot
pub struct SimSensors {
    state: Arc<Mutex<SimState>>,
}

impl RangeSensors for SimSensors {
    fn distance(&self, side: Side) -> f64 {
        lock(&self.state).range(side)
    }

    fn ping(&self, side: Side) -> f64 {
        lock(&self.state).range(side)
    }

    fn set_continuous(&self) {}
}

impl LightSensors for SimSensors {
    fn raw(&self, side: Side) -> f64 {
        lock(&self.state).light(side)
    }

    fn set_floodlight(&self, _on: bool) {}
}

impl ColorClassifier for SimSensors {
    fn classify(&self) -> Option<ColorId> {
        lock(&self.state).classify()
    }
}

impl Gripper for SimSensors {
    fn rotate_to(&self, side: Side, angle: f64) {
        lock(&self.state).set_jaw(side, angle);
    }
}

/// Latched obstacle flag read straight from the simulated range sensors
pub struct SimObstacleProbe {
    state: Arc<Mutex<SimState>>,
    threshold: f64,
    latched: AtomicBool,
}

impl ObstacleSensor for SimObstacleProbe {
    fn is_wall_ahead(&self) -> bool {
        if self.latched.load(Ordering::Acquire) {
            return true;
        }
        let state = lock(&self.state);
        let max = state.config.max_range;
        let close = Side::BOTH.iter().any(|&side| {
            let reading = state.range(side);
            reading > 0.0 && reading < max && reading <= self.threshold
        });
        if close {
            self.latched.store(true, Ordering::Release);
        }
        close
    }

    fn reset(&self) {
        self.latched.store(false, Ordering::Release);
    }

    fn start(&mut self) -> Result<(), GridflagError> {
        self.reset();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GridflagError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(sim: SimConfig) -> SimArena {
        SimArena::new(&GridflagConfig {
            sim,
            ..GridflagConfig::default()
        })
    }

    #[test]
    fn wait_advances_the_clock_and_the_wheels() {
        let arena = arena(SimConfig::default());
        let mut drive = arena.drive();
        drive.set_speeds(250.0, 250.0);
        drive.wait(Duration::from_secs(1));

        assert_eq!(arena.clock(), Duration::from_secs(1));
        let (left, right) = drive.tachometers();
        assert!((left - 250.0).abs() < 1e-6);
        assert!((right - 250.0).abs() < 1e-6);
        assert!(arena.true_pose().x > 9.0);
    }

    #[test]
    fn closing_both_jaws_picks_up_a_nearby_block() {
        let arena = arena(SimConfig {
            blocks: vec![BlockSpec { x: -12.0, y: 0.0, color: ColorId(3), size: 6.0 }],
            ..SimConfig::default()
        });
        let sensors = arena.sensors();

        sensors.rotate_to(Side::Left, -200.0);
        assert_eq!(arena.carried(), None);
        sensors.rotate_to(Side::Right, -200.0);
        assert_eq!(arena.carried(), Some(ColorId(3)));
        assert!(arena.blocks().is_empty());

        sensors.rotate_to(Side::Left, 0.0);
        assert_eq!(arena.carried(), None);
        let (position, _) = arena.blocks()[0];
        assert!((position.x + 13.0).abs() < 1e-9);
    }

    #[test]
    fn classifier_sees_only_what_is_in_front() {
        let arena = arena(SimConfig {
            blocks: vec![BlockSpec { x: 15.0, y: 0.0, color: ColorId(2), size: 6.0 }],
            ..SimConfig::default()
        });
        let sensors = arena.sensors();
        assert_eq!(sensors.classify(), Some(ColorId(2)));

        let mut drive = arena.drive();
        // half a turn in place
        let wheel = 17.25 * 180.0 / (2.0 * 2.1);
        drive.rotate(-wheel, wheel, 150.0);
        drive.wait(Duration::from_secs(10));
        assert_eq!(sensors.classify(), None);
    }

    #[test]
    fn probe_latches_until_reset() {
        let arena = arena(SimConfig {
            obstacles: vec![Zone { x_min: 20.0, y_min: -20.0, x_max: 30.0, y_max: 20.0 }],
            ..SimConfig::default()
        });
        let probe = arena.obstacle_probe(20.0);
        assert!(probe.is_wall_ahead());
        probe.reset();

        let mut drive = arena.drive();
        let wheel = 17.25 * 180.0 / (2.0 * 2.1);
        drive.rotate(-wheel, wheel, 150.0);
        drive.wait(Duration::from_secs(10));
        assert!(!probe.is_wall_ahead());
    }
}
