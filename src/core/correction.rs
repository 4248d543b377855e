// core/correction.rs

// Grid-line odometry correction. Two downward light sensors sit behind the wheel
// axle; when one of them reads darker than its calibrated baseline the robot is
// crossing a ruled line, so the sensor's world position must lie on a multiple of
// the grid spacing. The pose axis whose projection is closer to a line is snapped.

use super::geometry::GridSpacing;
use super::localization::{PoseEstimator, TurnSignal};
use super::worker::Worker;
use crate::GridflagError;
use crate::config::CorrectionConfig;
use crate::devices::{LightSensors, Side};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Ambient intensity per sensor, averaged while stationary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Left sensor
    pub left: f64,
    /// Right sensor
    pub right: f64,
}

/// Pose axis adjusted by a correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `pose.x`
    X,
    /// `pose.y`
    Y,
}

/// One applied snap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Sensor that saw the line
    pub side: Side,
    /// Axis that was snapped
    pub axis: Axis,
    /// Pose coordinate before the snap
    pub from: f64,
    /// Pose coordinate after the snap
    pub to: f64,
}

/// Background corrector over the shared pose estimate
pub struct LineCrossingCorrector {
    config: CorrectionConfig,
    spacing: GridSpacing,
    estimator: PoseEstimator,
    turning: TurnSignal,
    sensors: Arc<dyn LightSensors>,
    baseline: Option<Baseline>,
}

impl LineCrossingCorrector {
    /// Creates an uncalibrated corrector
    pub fn new(
        config: CorrectionConfig,
        spacing: GridSpacing,
        estimator: PoseEstimator,
        turning: TurnSignal,
        sensors: Arc<dyn LightSensors>,
    ) -> Self {
        LineCrossingCorrector {
            config,
            spacing,
            estimator,
            turning,
            sensors,
            baseline: None,
        }
    }

    /// Samples both sensors while stationary and stores the ambient baseline
    pub fn calibrate(&mut self) -> Baseline {
        self.sensors.set_floodlight(true);
        let samples = self.config.calibration_samples.max(1);
        let (mut left, mut right) = (0.0, 0.0);
        for _ in 0..samples {
            left += self.sensors.raw(Side::Left);
            right += self.sensors.raw(Side::Right);
            thread::sleep(Duration::from_millis(self.config.calibration_delay_ms));
        }
        let baseline = Baseline {
            left: left / samples as f64,
            right: right / samples as f64,
        };
        log::info!(
            "Light baseline calibrated: left={:.1}, right={:.1}",
            baseline.left,
            baseline.right
        );
        self.baseline = Some(baseline);
        baseline
    }

    /// Uses a known baseline instead of sampling
    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Current baseline, if calibrated
    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    /// True when `raw` is darker than the calibrated threshold for `side`
    pub fn line_detected(&self, side: Side, raw: f64) -> bool {
        let Some(baseline) = self.baseline else {
            return false;
        };
        match side {
            Side::Left => raw < baseline.left * self.config.left_threshold,
            Side::Right => raw < baseline.right * self.config.right_threshold,
        }
    }

    /// Lever arm from the rotation center to a sensor as (length, angle in degrees
    /// relative to the heading)
    fn lever_arm(&self, side: Side) -> (f64, f64) {
        let lateral = match side {
            Side::Left => self.config.lateral_offset,
            Side::Right => -self.config.lateral_offset,
        };
        let forward = self.config.forward_offset;
        (forward.hypot(lateral), lateral.atan2(forward).to_degrees())
    }

    /// Runs one correction cycle; returns the snaps applied
    pub fn correct_once(&self) -> Vec<Correction> {
        if self.turning.is_turning() || self.baseline.is_none() {
            return Vec::new();
        }

        let mut applied = Vec::new();
        for side in Side::BOTH {
            let raw = self.sensors.raw(side);
            if !self.line_detected(side, raw) {
                continue;
            }
            // heading may have started changing between the check above and now
            if self.turning.is_turning() {
                break;
            }
            let (length, angle) = self.lever_arm(side);
            let spacing = self.spacing;
            let correction = self.estimator.update(|pose| {
                let direction = (pose.heading + angle).to_radians();
                let sensor_x = pose.x + length * direction.cos();
                let sensor_y = pose.y + length * direction.sin();

                let line_x = spacing.nearest_line(sensor_x);
                let line_y = spacing.nearest_line(sensor_y);
                if (sensor_x - line_x).abs() <= (sensor_y - line_y).abs() {
                    let from = pose.x;
                    pose.x += line_x - sensor_x;
                    Correction { side, axis: Axis::X, from, to: pose.x }
                } else {
                    let from = pose.y;
                    pose.y += line_y - sensor_y;
                    Correction { side, axis: Axis::Y, from, to: pose.y }
                }
            });
            log::debug!(
                "{:?} sensor crossed a line: {:?} {:.2} -> {:.2}",
                correction.side,
                correction.axis,
                correction.from,
                correction.to
            );
            applied.push(correction);
        }
        applied
    }

    /// Moves the corrector onto its own periodic thread
    pub fn spawn(self) -> Result<Worker, GridflagError> {
        if self.baseline.is_none() {
            return Err(GridflagError::NotInitialized);
        }
        let period = Duration::from_millis(self.config.period_ms);
        Worker::spawn("line-correction", period, move || {
            self.correct_once();
        })
    }
}
