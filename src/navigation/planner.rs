// src/navigation/planner.rs
// Rectilinear router with a standing bias toward increasing coordinates. The
// robot alternates +X and +Y legs; when a leg is blocked it turns onto the other
// axis and probes, and when that is blocked too it retreats to a recorded
// checkpoint and carries on from there. Negative legs are short sidesteps that
// hand control back to the bias once they finish.

use super::NavigationError;
use super::controller::{Completion, DriveOutcome, MotionController, TravelOutcome};
use crate::config::PathfinderConfig;
use crate::core::geometry::{distance, Point, Zone};
use crate::core::localization::Pose;
use crate::core::ranging::ObstacleSensor;
use crate::devices::Drive;
use log::{debug, error, info, warn};
use std::time::Duration;

/// Bias direction of a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward increasing X
    XPositive,
    /// Toward increasing Y
    YPositive,
    /// Toward decreasing X
    XNegative,
    /// Toward decreasing Y
    YNegative,
}

impl Direction {
    /// Heading that drives in this direction
    pub fn heading(self) -> f64 {
        match self {
            Direction::XPositive => 0.0,
            Direction::YPositive => 90.0,
            Direction::XNegative => 180.0,
            Direction::YNegative => 270.0,
        }
    }

    /// True for the two bias directions
    pub fn is_positive(self) -> bool {
        matches!(self, Direction::XPositive | Direction::YPositive)
    }

    /// Direction to try after being blocked
    pub fn on_block(self, x_reached: bool, y_reached: bool) -> Direction {
        match self {
            Direction::XPositive if !y_reached => Direction::YPositive,
            Direction::XPositive => Direction::YNegative,
            Direction::YPositive if !x_reached => Direction::XPositive,
            Direction::YPositive => Direction::XNegative,
            Direction::XNegative => Direction::YNegative,
            Direction::YNegative => Direction::XNegative,
        }
    }

    /// Direction of the next leg once this one finishes unobstructed
    pub fn after_leg(self) -> Direction {
        match self {
            Direction::XPositive => Direction::YPositive,
            Direction::YPositive => Direction::XPositive,
            Direction::XNegative => Direction::YPositive,
            Direction::YNegative => Direction::XPositive,
        }
    }
}

/// Router state, logged on every change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// Driving along X
    MovingPrimary,
    /// Driving along Y
    MovingSecondary,
    /// Stopped by an obstacle or the exclusion zone
    Blocked,
    /// Retreating to a checkpoint
    Backtracking,
    /// At the destination
    Done,
}

/// Why a leg stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegHalt {
    Arrived,
    Obstacle,
    Exclusion,
    AxisReached,
}

/// Halt conditions of one leg
struct LegWatch {
    direction: Direction,
    dest: Point,
    tolerance: f64,
    exclusion: Option<Zone>,
}

impl LegWatch {
    /// Checks one poll; a position is recorded as a checkpoint only once it is
    /// known to be clear of obstacles and outside the exclusion zone
    fn check(
        &self,
        pose: &Pose,
        wall_ahead: impl FnOnce() -> bool,
        checkpoints: &mut CheckpointStack,
    ) -> Option<LegHalt> {
        if arrived(pose, &self.dest, self.tolerance) {
            return Some(LegHalt::Arrived);
        }
        if wall_ahead() {
            return Some(LegHalt::Obstacle);
        }
        if self
            .exclusion
            .is_some_and(|zone| zone.contains(&pose.position()))
        {
            return Some(LegHalt::Exclusion);
        }
        checkpoints.record(pose.position());
        axis_reached(self.direction, pose, &self.dest).then_some(LegHalt::AxisReached)
    }
}

/// Obstacle-free positions recorded along the route, newest last
#[derive(Debug, Clone)]
pub struct CheckpointStack {
    points: Vec<Point>,
    last: Option<Point>,
    interval: f64,
}

impl CheckpointStack {
    /// Records a checkpoint every `interval` of travel
    pub fn new(interval: f64) -> Self {
        CheckpointStack {
            points: Vec::new(),
            last: None,
            interval,
        }
    }

    /// Clears the stack and records the starting position
    pub fn reseed(&mut self, start: Point) {
        self.points.clear();
        self.points.push(start);
        self.last = Some(start);
    }

    /// Pushes `position` if it is more than one interval from the last checkpoint
    pub fn record(&mut self, position: Point) -> bool {
        let due = self
            .last
            .is_none_or(|last| distance(&last, &position) > self.interval);
        if due {
            self.points.push(position);
            self.last = Some(position);
        }
        due
    }

    /// Pops checkpoints until one lies at least `min_distance` from `from`;
    /// closer ones are discarded
    pub fn pop_recovery(&mut self, from: &Point, min_distance: f64) -> Option<Point> {
        while let Some(point) = self.points.pop() {
            if distance(&point, from) >= min_distance {
                return Some(point);
            }
        }
        None
    }

    /// Restarts the interval count from `position` without recording it
    pub fn mark(&mut self, position: Point) {
        self.last = Some(position);
    }

    /// Recorded checkpoints, oldest first
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of recorded checkpoints
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when nothing is left to retreat to
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One retreat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backtrack {
    /// Dead-end position
    pub from: Point,
    /// Checkpoint retreated to
    pub to: Point,
}

/// Summary of a completed route
#[derive(Debug, Clone)]
pub struct PathReport {
    /// Legs driven
    pub legs: usize,
    /// Retreats made, in order
    pub backtracks: Vec<Backtrack>,
    /// Pose on arrival
    pub final_pose: Pose,
}

/// Bias-switching router
pub struct Pathfinder {
    config: PathfinderConfig,
    exclusion: Option<Zone>,
    checkpoints: CheckpointStack,
    state: PathState,
    facing: Option<Direction>,
}

fn arrived(pose: &Pose, dest: &Point, tolerance: f64) -> bool {
    (pose.x >= dest.x && pose.y >= dest.y) || distance(&pose.position(), dest) < tolerance
}

fn axis_reached(direction: Direction, pose: &Pose, dest: &Point) -> bool {
    match direction {
        Direction::XPositive => pose.x >= dest.x,
        Direction::YPositive => pose.y >= dest.y,
        Direction::XNegative | Direction::YNegative => false,
    }
}

impl Pathfinder {
    /// Creates a router; `exclusion` is treated like an obstacle
    pub fn new(config: PathfinderConfig, exclusion: Option<Zone>) -> Self {
        let checkpoints = CheckpointStack::new(config.checkpoint_interval);
        Pathfinder {
            config,
            exclusion,
            checkpoints,
            state: PathState::Done,
            facing: None,
        }
    }

    /// Replaces the exclusion zone, e.g. after the frame changes
    pub fn set_exclusion(&mut self, exclusion: Option<Zone>) {
        self.exclusion = exclusion;
    }

    /// Current router state
    pub fn state(&self) -> PathState {
        self.state
    }

    /// Checkpoints of the current or last route
    pub fn checkpoints(&self) -> &CheckpointStack {
        &self.checkpoints
    }

    fn set_state(&mut self, state: PathState) {
        if self.state != state {
            debug!("Pathfinder {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn leg_target(&self, direction: Direction, pose: &Pose, dest: &Point) -> Point {
        let overshoot = self.config.axis_overshoot;
        let back = self.config.reverse_leg();
        match direction {
            Direction::XPositive => Point::new(dest.x + overshoot, pose.y),
            Direction::YPositive => Point::new(pose.x, dest.y + overshoot),
            Direction::XNegative => Point::new(pose.x - back, pose.y),
            Direction::YNegative => Point::new(pose.x, pose.y - back),
        }
    }

    /// Turns onto `direction`, re-arms the obstacle flag and lets the sensors settle
    fn face<D: Drive>(
        &mut self,
        motion: &mut MotionController<D>,
        obstacles: &dyn ObstacleSensor,
        direction: Direction,
    ) {
        motion.turn_to(direction.heading());
        obstacles.reset();
        motion.pause(Duration::from_millis(self.config.settle_ms));
        self.facing = Some(direction);
    }

    /// Routes to `dest`, backtracking around dead ends
    pub fn path_to<D: Drive>(
        &mut self,
        motion: &mut MotionController<D>,
        obstacles: &dyn ObstacleSensor,
        dest: Point,
    ) -> Result<PathReport, NavigationError> {
        let start = motion.pose();
        info!(
            "Routing from ({:.1}, {:.1}) to ({:.1}, {:.1})",
            start.x, start.y, dest.x, dest.y
        );
        self.checkpoints.reseed(start.position());
        self.facing = None;

        let mut direction = Direction::XPositive;
        let mut legs = 0;
        let mut backtracks = Vec::new();

        loop {
            let pose = motion.pose();
            if arrived(&pose, &dest, self.config.arrival_tolerance) {
                break;
            }
            if direction.is_positive() && axis_reached(direction, &pose, &dest) {
                direction = direction.after_leg();
            }
            if legs >= self.config.max_legs {
                error!("Leg budget of {} exhausted", legs);
                return Err(NavigationError::LegBudgetExhausted { legs });
            }
            legs += 1;

            self.set_state(match direction {
                Direction::XPositive | Direction::XNegative => PathState::MovingPrimary,
                Direction::YPositive | Direction::YNegative => PathState::MovingSecondary,
            });
            if self.facing != Some(direction) {
                self.face(motion, obstacles, direction);
            }

            let pose = motion.pose();
            let target = self.leg_target(direction, &pose, &dest);
            debug!(
                "Leg {} {:?} toward ({:.1}, {:.1})",
                legs, direction, target.x, target.y
            );

            let watch = LegWatch {
                direction,
                dest,
                tolerance: self.config.arrival_tolerance,
                exclusion: self.exclusion,
            };
            let checkpoints = &mut self.checkpoints;
            let outcome = motion.travel_until(target.x, target.y, |pose| {
                watch.check(pose, || obstacles.is_wall_ahead(), checkpoints)
            });

            let pose = motion.pose();
            let blocked = match outcome {
                DriveOutcome::Halted(LegHalt::Arrived) => break,
                DriveOutcome::Halted(LegHalt::AxisReached) => None,
                DriveOutcome::Halted(cause) => Some(cause),
                // a bias leg that ends short of its axis was stopped by something
                DriveOutcome::Completed | DriveOutcome::TimedOut => {
                    (direction.is_positive() && !axis_reached(direction, &pose, &dest))
                        .then_some(LegHalt::Obstacle)
                }
            };

            direction = match blocked {
                None => direction.after_leg(),
                Some(cause) => self.handle_block(motion, obstacles, direction, cause, &dest, &mut backtracks)?,
            };
        }

        self.set_state(PathState::Done);
        let final_pose = motion.stop();
        info!(
            "Arrived at ({:.1}, {:.1}) after {} legs and {} backtracks",
            final_pose.x,
            final_pose.y,
            legs,
            backtracks.len()
        );
        Ok(PathReport {
            legs,
            backtracks,
            final_pose,
        })
    }

    fn handle_block<D: Drive>(
        &mut self,
        motion: &mut MotionController<D>,
        obstacles: &dyn ObstacleSensor,
        direction: Direction,
        cause: LegHalt,
        dest: &Point,
        backtracks: &mut Vec<Backtrack>,
    ) -> Result<Direction, NavigationError> {
        self.set_state(PathState::Blocked);
        let pose = motion.stop();
        info!(
            "Blocked by {:?} heading {:?} at ({:.1}, {:.1})",
            cause, direction, pose.x, pose.y
        );

        let pose = if cause == LegHalt::Exclusion {
            motion.go_forward_speed(-self.config.escape_speed);
            motion.pause(Duration::from_millis(self.config.escape_ms));
            motion.stop()
        } else {
            pose
        };

        let next = direction.on_block(pose.x >= dest.x, pose.y >= dest.y);
        if direction.is_positive() {
            self.face(motion, obstacles, next);
            if obstacles.is_wall_ahead() {
                self.backtrack(motion, backtracks)?;
            }
        }
        obstacles.reset();
        Ok(next)
    }

    fn backtrack<D: Drive>(
        &mut self,
        motion: &mut MotionController<D>,
        backtracks: &mut Vec<Backtrack>,
    ) -> Result<(), NavigationError> {
        self.set_state(PathState::Backtracking);
        let from = motion.pose().position();
        if backtracks.len() >= self.config.max_backtracks {
            error!("Backtrack budget of {} exhausted", backtracks.len());
            return Err(NavigationError::BacktrackBudgetExhausted {
                backtracks: backtracks.len(),
            });
        }
        let Some(to) = self
            .checkpoints
            .pop_recovery(&from, self.config.min_recovery_distance)
        else {
            error!(
                "Dead end at ({:.1}, {:.1}) with no checkpoint to return to",
                from.x, from.y
            );
            return Err(NavigationError::CheckpointsExhausted { at: from });
        };

        info!(
            "Backtracking from ({:.1}, {:.1}) to ({:.1}, {:.1})",
            from.x, from.y, to.x, to.y
        );
        if let TravelOutcome::NotConverged { error } = motion.travel_to(to.x, to.y, Completion::Block) {
            warn!("Checkpoint missed by {:.1}", error);
        }
        self.checkpoints.mark(motion.pose().position());
        self.facing = None;
        backtracks.push(Backtrack { from, to });
        Ok(())
    }
}
