//! Search and acquisition for Gridflag
//!
//! The robot stands at a scan origin inside the search zone and sweeps its
//! heading in small steps until both range sensors see something nearer than
//! the zone's far side. It then creeps up to the object, reads its color, and
//! either grabs it or carries it out of the zone and resumes the sweep.

pub mod scan;

pub use scan::{ScanAxis, ScanCycle, ScanPlan, SweepDirection};

use crate::config::SearchConfig;
use crate::core::geometry::{distance, Point, Zone};
use crate::core::localization::Pose;
use crate::devices::{ColorClassifier, ColorId, Drive, Gripper, RangeSensors, Side};
use crate::navigation::controller::{Completion, DriveOutcome, MotionController, TravelOutcome};
use log::{debug, info, warn};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// The target is in the gripper
    Acquired {
        /// Pose right after the grab
        at: Pose,
        /// Scan cycles started
        scans: usize,
        /// Objects carried out of the zone
        rejected: usize,
    },
    /// Every scan cycle ran without finding the target
    ZoneExhausted {
        /// Scan cycles run
        scans: usize,
        /// Objects carried out of the zone
        rejected: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Approach {
    InRange,
    TooFar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inspection {
    Missed,
    Rejected,
    Acquired,
}

/// Sweep-and-classify search over one zone
pub struct SearchAndAcquire {
    config: SearchConfig,
    ranges: Arc<dyn RangeSensors>,
    classifier: Arc<dyn ColorClassifier>,
    gripper: Arc<dyn Gripper>,
}

impl SearchAndAcquire {
    /// Creates the search routine over the robot's sensors and gripper
    pub fn new(
        config: SearchConfig,
        ranges: Arc<dyn RangeSensors>,
        classifier: Arc<dyn ColorClassifier>,
        gripper: Arc<dyn Gripper>,
    ) -> Self {
        SearchAndAcquire {
            config,
            ranges,
            classifier,
            gripper,
        }
    }

    /// Sweeps `zone` until an object of color `target` is in the gripper or
    /// the pass budget runs out
    pub fn search<D: Drive>(
        &self,
        motion: &mut MotionController<D>,
        zone: &Zone,
        target: ColorId,
    ) -> SearchOutcome {
        let plan = ScanPlan::new(zone, &self.config);
        let max_object = plan.max_object_distance();
        let reject_point = plan.reject_point();
        let axis_heading = plan.axis().heading();
        info!(
            "Searching ({:.1}, {:.1})-({:.1}, {:.1}) along {:?} for color {}, objects within {:.1}",
            zone.x_min, zone.y_min, zone.x_max, zone.y_max, plan.axis(), target.0, max_object
        );

        self.ranges.set_continuous();
        let mut scans = 0;
        let mut rejected = 0;

        for cycle in plan {
            scans += 1;
            debug!(
                "Scan {} at ({:.1}, {:.1}), {:?} window {:.0}..{:.0}",
                scans, cycle.origin.x, cycle.origin.y, cycle.direction, cycle.start, cycle.end
            );
            self.go_to(motion, cycle.origin);

            let mut angle = cycle.start;
            while self.locate(motion, &mut angle, cycle.end, max_object).is_some() {
                match self.inspect(motion, cycle.origin, target) {
                    Inspection::Acquired => {
                        let at = motion.pose();
                        info!(
                            "Acquired color {} at ({:.1}, {:.1}) after {} scans, {} rejected",
                            target.0, at.x, at.y, scans, rejected
                        );
                        return SearchOutcome::Acquired {
                            at,
                            scans,
                            rejected,
                        };
                    }
                    Inspection::Rejected => {
                        rejected += 1;
                        self.discard(motion, reject_point, axis_heading);
                        self.go_to(motion, cycle.origin);
                    }
                    Inspection::Missed => self.go_to(motion, cycle.origin),
                }
            }
        }

        warn!(
            "Search zone exhausted after {} scans, {} rejected",
            scans, rejected
        );
        SearchOutcome::ZoneExhausted { scans, rejected }
    }

    // Steps the heading through the window; on a hit, squares up to the
    // object and returns the refined heading.
    fn locate<D: Drive>(
        &self,
        motion: &mut MotionController<D>,
        angle: &mut f64,
        end: f64,
        max_object: f64,
    ) -> Option<f64> {
        let within = |reading: f64| reading > 0.0 && reading <= max_object;
        loop {
            *angle += self.config.sweep_step;
            if *angle >= end {
                return None;
            }
            motion.turn_to(*angle);

            let left = self.ranges.distance(Side::Left);
            let right = self.ranges.distance(Side::Right);
            if within(left) && within(right) {
                info!(
                    "Object at heading {:.0} (left {:.1}, right {:.1})",
                    *angle, left, right
                );
                *angle += self.config.refine_angle;
                motion.turn_to(*angle);
                return Some(*angle);
            }
        }
    }

    fn inspect<D: Drive>(
        &self,
        motion: &mut MotionController<D>,
        origin: Point,
        target: ColorId,
    ) -> Inspection {
        if self.approach(motion, origin) == Approach::TooFar {
            debug!("Approach passed {:.0} without closing in", self.config.max_travel_distance);
            return Inspection::Missed;
        }

        let color = self.classifier.classify();
        self.back_off(motion);
        let Some(color) = color else {
            debug!("Nothing to classify");
            return Inspection::Missed;
        };

        let heading = motion.pose().heading;
        motion.turn_to(heading + 180.0);
        if color == target {
            info!("Color {} matches, grabbing", color.0);
            motion.move_forward_distance(self.config.grab_speed, -self.config.grab_backoff);
            self.grip(self.config.gripper_closed);
            motion.turn_to(0.0);
            Inspection::Acquired
        } else {
            info!("Color {} is not {}, removing it", color.0, target.0);
            motion.move_forward_distance(self.config.grab_speed, -self.config.reject_backoff);
            self.grip(self.config.gripper_closed);
            Inspection::Rejected
        }
    }

    fn approach<D: Drive>(&self, motion: &mut MotionController<D>, origin: Point) -> Approach {
        let pickup = self.config.pickup_distance;
        let max_travel = self.config.max_travel_distance;
        let budget = self.creep_polls(motion, 2.0 * max_travel);
        let ranges = &self.ranges;

        let outcome = motion.drive_until(self.config.approach_speed, budget, |pose| {
            let close = Side::BOTH.iter().any(|&side| {
                let reading = ranges.ping(side);
                reading > 0.0 && reading <= pickup
            });
            if close {
                Some(Approach::InRange)
            } else if distance(&pose.position(), &origin) > max_travel {
                Some(Approach::TooFar)
            } else {
                None
            }
        });

        match outcome {
            DriveOutcome::Halted(Approach::InRange) => {
                // creep the last bit so the object sits under the color sensor
                motion.go_forward_speed(self.config.approach_speed);
                motion.pause(self.settle());
                motion.stop();
                Approach::InRange
            }
            _ => Approach::TooFar,
        }
    }

    fn back_off<D: Drive>(&self, motion: &mut MotionController<D>) {
        let clearance = self.config.turn_clearance;
        let ranges = &self.ranges;

        motion.go_forward_speed(-self.config.approach_speed);
        motion.pause(self.settle());
        let budget = self.creep_polls(motion, 3.0 * clearance);
        let outcome = motion.drive_until(-self.config.approach_speed, budget, |_| {
            Side::BOTH
                .iter()
                .all(|&side| ranges.distance(side) >= clearance)
                .then_some(())
        });
        if outcome == DriveOutcome::TimedOut {
            debug!("Backed off without reaching {:.1} clearance", clearance);
        }
    }

    fn discard<D: Drive>(&self, motion: &mut MotionController<D>, at: Point, heading: f64) {
        self.go_to(motion, at);
        // rear toward the outside of the zone
        motion.turn_to(heading);
        self.grip(self.config.gripper_open);
        debug!("Released reject at ({:.1}, {:.1})", at.x, at.y);
    }

    fn go_to<D: Drive>(&self, motion: &mut MotionController<D>, point: Point) {
        if let TravelOutcome::NotConverged { error } =
            motion.travel_to(point.x, point.y, Completion::Block)
        {
            warn!("Missed ({:.1}, {:.1}) by {:.1}", point.x, point.y, error);
        }
    }

    fn grip(&self, angle: f64) {
        self.gripper.rotate_to(Side::Right, angle);
        self.gripper.rotate_to(Side::Left, angle);
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.config.settle_ms)
    }

    // Polls needed to creep `distance` at the approach speed, with slack
    fn creep_polls<D: Drive>(&self, motion: &MotionController<D>, distance: f64) -> usize {
        let robot = motion.config();
        let speed = self.config.approach_speed.abs() * PI * robot.wheel_radius / 180.0;
        let seconds = distance / speed.max(f64::EPSILON);
        (seconds * 1000.0 / robot.poll_period_ms.max(1) as f64).ceil() as usize + 25
    }
}
