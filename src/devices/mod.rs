// devices/mod.rs

// Capability traits the navigation core is written against. Drivers for a
// physical brick implement these; `sim` implements all of them over a simulated
// arena so the whole stack can run without hardware.

pub mod sim;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which of a sensor or actuator pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Left of the heading
    Left,
    /// Right of the heading
    Right,
}

impl Side {
    /// Both sides, left first
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];
}

/// Discrete color id reported by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorId(pub u8);

/// Differential drive with wheel tachometers
pub trait Drive: Send {
    /// Continuous wheel speeds in wheel degrees per second; negative runs backwards
    fn set_speeds(&mut self, left: f64, right: f64);

    /// Relative rotation of each wheel in degrees at `speed`; returns immediately
    fn rotate(&mut self, left_degrees: f64, right_degrees: f64, speed: f64);

    /// Stops both wheels
    fn stop(&mut self);

    /// True while a `rotate` command or a nonzero speed is active
    fn is_moving(&self) -> bool;

    /// Absolute wheel rotation since power-on, in degrees
    fn tachometers(&self) -> (f64, f64);

    /// Blocks the control thread; simulated drives advance their clock here
    fn wait(&mut self, duration: Duration);
}

/// Two forward-facing range sensors
#[cfg_attr(test, mockall::automock)]
pub trait RangeSensors: Send + Sync {
    /// Latest continuous-mode reading
    fn distance(&self, side: Side) -> f64;

    /// Single-shot reading
    fn ping(&self, side: Side) -> f64;

    /// Puts both sensors back into continuous mode
    fn set_continuous(&self);
}

/// Two downward light sensors with floodlights
#[cfg_attr(test, mockall::automock)]
pub trait LightSensors: Send + Sync {
    /// Raw reflected intensity
    fn raw(&self, side: Side) -> f64;

    /// Turns both floodlights on or off
    fn set_floodlight(&self, on: bool);
}

/// Color sensor facing whatever sits in front of the robot
#[cfg_attr(test, mockall::automock)]
pub trait ColorClassifier: Send + Sync {
    /// Color of the object in front, if any
    fn classify(&self) -> Option<ColorId>;
}

/// Two-jaw gripper with independent actuators
#[cfg_attr(test, mockall::automock)]
pub trait Gripper: Send + Sync {
    /// Moves one jaw to an absolute angle
    fn rotate_to(&self, side: Side, angle: f64);
}
