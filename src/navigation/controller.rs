// src/navigation/controller.rs
// Motion primitives over a differential drive. Every primitive blocks the
// calling thread and polls the wheel tachometers into the shared pose estimate
// while it waits, so callers always see a fresh pose when a primitive returns.
// Wheel targets are in wheel degrees: distance d is 180·d/(π·r), an in-place
// rotation by angle a moves each wheel π·w·a/360.

use crate::config::RobotConfig;
use crate::core::geometry::{bearing, distance, minimal_delta, Point};
use crate::core::localization::{Pose, PoseEstimator, TurnSignal};
use crate::devices::Drive;
use log::{debug, warn};
use std::f64::consts::PI;
use std::time::Duration;

/// Whether `travel_to` waits for the move to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Block until the wheels stop, retrying once to absorb drift
    Block,
    /// Issue the final straight move and return immediately
    Return,
}

/// Result of `travel_to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TravelOutcome {
    /// Within position tolerance of the target
    Arrived,
    /// Move issued with `Completion::Return`
    Issued,
    /// Still outside tolerance after every attempt
    NotConverged {
        /// Remaining distance
        error: f64,
    },
}

/// Result of a polled drive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveOutcome<H> {
    /// The wheels finished the commanded move
    Completed,
    /// The halt predicate fired; the robot is stopped
    Halted(H),
    /// The poll budget ran out; the robot is stopped
    TimedOut,
}

/// Blocking motion primitives
pub struct MotionController<D: Drive> {
    drive: D,
    estimator: PoseEstimator,
    turning: TurnSignal,
    config: RobotConfig,
}

impl<D: Drive> MotionController<D> {
    /// Wraps a drive; `estimator` and `turning` are shared with the corrector
    pub fn new(drive: D, estimator: PoseEstimator, turning: TurnSignal, config: RobotConfig) -> Self {
        MotionController {
            drive,
            estimator,
            turning,
            config,
        }
    }

    /// Integrates the latest tachometer readings and returns the pose
    pub fn pose(&mut self) -> Pose {
        let (left, right) = self.drive.tachometers();
        self.estimator.integrate(left, right)
    }

    /// Shared pose estimate
    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    /// Turning flag shared with the corrector
    pub fn turn_signal(&self) -> TurnSignal {
        self.turning.clone()
    }

    /// True while `turn_to` is rotating
    pub fn is_turning(&self) -> bool {
        self.turning.is_turning()
    }

    /// Robot geometry and tolerances
    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    fn wheel_degrees(&self, distance: f64) -> f64 {
        180.0 * distance / (PI * self.config.wheel_radius)
    }

    fn rotation_degrees(&self, angle: f64) -> f64 {
        self.wheel_degrees(PI * self.config.track_width * angle / 360.0)
    }

    fn poll_period(&self) -> Duration {
        Duration::from_millis(self.config.poll_period_ms.max(1))
    }

    // Twice the nominal duration plus slack
    fn poll_budget(&self, wheel_degrees: f64, speed: f64) -> usize {
        let seconds = wheel_degrees.abs() / speed.abs().max(1.0);
        let polls = seconds * 1000.0 / self.config.poll_period_ms.max(1) as f64;
        (2.0 * polls).ceil() as usize + 25
    }

    fn poll(&mut self) -> Pose {
        let period = self.poll_period();
        self.drive.wait(period);
        self.pose()
    }

    fn wait_idle(&mut self, budget: usize) -> bool {
        for _ in 0..budget {
            self.poll();
            if !self.drive.is_moving() {
                return true;
            }
        }
        warn!("Drive still moving after {} polls, stopping", budget);
        self.drive.stop();
        false
    }

    /// Rotates in place to `heading` along the shorter way. Returns the signed
    /// rotation commanded, or 0 when already within tolerance.
    pub fn turn_to(&mut self, heading: f64) -> f64 {
        let current = self.pose().heading;
        let delta = minimal_delta(current, heading);
        if delta.abs() <= self.config.heading_tolerance {
            return 0.0;
        }

        // positive delta is counter-clockwise: right wheel forward
        let wheel = self.rotation_degrees(delta);
        self.turning.set(true);
        self.drive.rotate(-wheel, wheel, self.config.slow_speed);
        let budget = self.poll_budget(wheel, self.config.slow_speed);
        self.wait_idle(budget);
        self.drive.stop();
        self.turning.set(false);

        let pose = self.pose();
        debug!("Turned {:.1} to heading {:.1}", delta, pose.heading);
        delta
    }

    fn face(&mut self, heading: f64) {
        for _ in 0..self.config.max_turn_retries.max(1) {
            if self.turn_to(heading) == 0.0 {
                break;
            }
        }
    }

    /// Faces `(x, y)` and drives straight to it, re-aiming once more if drift
    /// left it outside tolerance
    pub fn travel_to(&mut self, x: f64, y: f64, completion: Completion) -> TravelOutcome {
        let target = Point::new(x, y);
        for _ in 0..self.config.max_travel_attempts.max(1) {
            let pose = self.pose();
            if distance(&pose.position(), &target) <= self.config.position_tolerance {
                return TravelOutcome::Arrived;
            }
            self.face(bearing(&pose.position(), &target));

            let pose = self.pose();
            let wheel = self.wheel_degrees(distance(&pose.position(), &target));
            self.drive.rotate(wheel, wheel, self.config.mid_speed);
            if completion == Completion::Return {
                return TravelOutcome::Issued;
            }
            let budget = self.poll_budget(wheel, self.config.mid_speed);
            self.wait_idle(budget);
        }

        let error = distance(&self.pose().position(), &target);
        if error <= self.config.position_tolerance {
            TravelOutcome::Arrived
        } else {
            warn!("travel_to ({:.1}, {:.1}) stopped {:.1} short", x, y, error);
            TravelOutcome::NotConverged { error }
        }
    }

    /// Faces `(x, y)` and drives toward it, checking `halt` on every poll
    pub fn travel_until<H>(
        &mut self,
        x: f64,
        y: f64,
        mut halt: impl FnMut(&Pose) -> Option<H>,
    ) -> DriveOutcome<H> {
        let target = Point::new(x, y);
        let pose = self.pose();
        self.face(bearing(&pose.position(), &target));

        let pose = self.pose();
        if let Some(reason) = halt(&pose) {
            return DriveOutcome::Halted(reason);
        }
        let wheel = self.wheel_degrees(distance(&pose.position(), &target));
        self.drive.rotate(wheel, wheel, self.config.mid_speed);

        for _ in 0..self.poll_budget(wheel, self.config.mid_speed) {
            let pose = self.poll();
            if let Some(reason) = halt(&pose) {
                self.stop();
                return DriveOutcome::Halted(reason);
            }
            if !self.drive.is_moving() {
                return DriveOutcome::Completed;
            }
        }
        self.stop();
        DriveOutcome::TimedOut
    }

    /// Drives open-loop at `speed` (negative reverses) until `halt` fires or
    /// `max_polls` polls have passed
    pub fn drive_until<H>(
        &mut self,
        speed: f64,
        max_polls: usize,
        mut halt: impl FnMut(&Pose) -> Option<H>,
    ) -> DriveOutcome<H> {
        self.go_forward_speed(speed);
        for _ in 0..max_polls {
            let pose = self.poll();
            if let Some(reason) = halt(&pose) {
                self.stop();
                return DriveOutcome::Halted(reason);
            }
            if !self.drive.is_moving() {
                return DriveOutcome::Completed;
            }
        }
        self.stop();
        DriveOutcome::TimedOut
    }

    /// Both wheels at `speed`; negative reverses
    pub fn go_forward_speed(&mut self, speed: f64) {
        self.drive.set_speeds(speed, speed);
    }

    /// Stops both wheels
    pub fn stop(&mut self) -> Pose {
        self.drive.stop();
        self.pose()
    }

    /// Straight move of `distance` (negative reverses) with no destination check
    pub fn move_forward_distance(&mut self, speed: f64, distance: f64) -> Pose {
        let wheel = self.wheel_degrees(distance);
        self.drive.rotate(wheel, wheel, speed.abs());
        let budget = self.poll_budget(wheel, speed);
        self.wait_idle(budget);
        self.pose()
    }

    /// Lets time pass without commanding anything
    pub fn pause(&mut self, duration: Duration) -> Pose {
        self.drive.wait(duration);
        self.pose()
    }
}
