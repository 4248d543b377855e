// core/localization.rs

// Dead-reckoning pose estimate shared between the control thread and the
// correction loop. Wheel tachometer readings are integrated with differential-drive
// kinematics; the correction loop and the reframer overwrite it through the same
// lock, so every writer sees a consistent (x, y, heading) triple.

use super::geometry::{normalize_heading, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Pose: robot position and heading in arena coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Heading in degrees, [0, 360), counter-clockwise from +X
    pub heading: f64,
}

impl Pose {
    /// Creates a pose with a normalized heading
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Pose {
            x,
            y,
            heading: normalize_heading(heading),
        }
    }

    /// Pose at the frame origin facing +X
    pub fn origin() -> Self {
        Pose::new(0.0, 0.0, 0.0)
    }

    /// Position part of the pose
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::origin()
    }
}

struct OdometryState {
    pose: Pose,
    // last tachometer pair integrated; None until the first reading
    last_tacho: Option<(f64, f64)>,
}

/// Shared, lock-guarded pose estimate. Clones refer to the same estimate.
#[derive(Clone)]
pub struct PoseEstimator {
    shared: Arc<Mutex<OdometryState>>,
    wheel_radius: f64,
    track_width: f64,
}

impl PoseEstimator {
    /// Creates an estimator starting at `initial`
    pub fn new(initial: Pose, wheel_radius: f64, track_width: f64) -> Self {
        PoseEstimator {
            shared: Arc::new(Mutex::new(OdometryState {
                pose: initial,
                last_tacho: None,
            })),
            wheel_radius,
            track_width,
        }
    }

    fn lock(&self) -> MutexGuard<'_, OdometryState> {
        // a panicked writer never leaves a half-written pose behind
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current pose
    pub fn get_pose(&self) -> Pose {
        self.lock().pose
    }

    /// Replaces the pose; the tachometer baseline is kept so integration continues
    /// from the new value
    pub fn set_pose(&self, pose: Pose) {
        let mut state = self.lock();
        state.pose = Pose::new(pose.x, pose.y, pose.heading);
    }

    /// Read-modify-write under the lock
    pub fn update<R>(&self, f: impl FnOnce(&mut Pose) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state.pose);
        state.pose.heading = normalize_heading(state.pose.heading);
        result
    }

    /// Integrates absolute wheel rotations (degrees) since the previous call and
    /// returns the updated pose
    pub fn integrate(&self, left_degrees: f64, right_degrees: f64) -> Pose {
        let mut state = self.lock();
        let Some((prev_left, prev_right)) = state.last_tacho.replace((left_degrees, right_degrees))
        else {
            return state.pose;
        };

        let dist_left = (left_degrees - prev_left) * PI * self.wheel_radius / 180.0;
        let dist_right = (right_degrees - prev_right) * PI * self.wheel_radius / 180.0;
        if dist_left == 0.0 && dist_right == 0.0 {
            return state.pose;
        }

        let dist = (dist_left + dist_right) / 2.0;
        let dtheta = (dist_right - dist_left) / self.track_width;

        // Mid-point integration keeps arcs accurate
        let mid = state.pose.heading.to_radians() + dtheta / 2.0;
        state.pose.x += dist * mid.cos();
        state.pose.y += dist * mid.sin();
        state.pose.heading = normalize_heading(state.pose.heading + dtheta.to_degrees());

        log::trace!(
            "Integrated pose: x={:.2}, y={:.2}, heading={:.1}",
            state.pose.x,
            state.pose.y,
            state.pose.heading
        );
        state.pose
    }
}

/// Whether a rotation in place is in progress; written by the motion layer, read
/// by the correction loop
#[derive(Debug, Clone, Default)]
pub struct TurnSignal(Arc<AtomicBool>);

impl TurnSignal {
    /// Creates a signal in the not-turning state
    pub fn new() -> Self {
        TurnSignal::default()
    }

    /// Marks the start or end of a rotation
    pub fn set(&self, turning: bool) {
        self.0.store(turning, Ordering::Release);
    }

    /// True while a rotation in place is running
    pub fn is_turning(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIUS: f64 = 2.1;
    const TRACK: f64 = 17.25;

    fn wheel_degrees(distance: f64) -> f64 {
        180.0 * distance / (PI * RADIUS)
    }

    #[test]
    fn straight_line() {
        let estimator = PoseEstimator::new(Pose::origin(), RADIUS, TRACK);
        estimator.integrate(0.0, 0.0);

        let d = wheel_degrees(30.3);
        let pose = estimator.integrate(d, d);

        assert!((pose.x - 30.3).abs() < 1e-9);
        assert!(pose.y.abs() < 1e-9);
        assert!(pose.heading.abs() < 1e-9);
    }

    #[test]
    fn rotation_in_place() {
        let estimator = PoseEstimator::new(Pose::new(10.0, 10.0, 350.0), RADIUS, TRACK);
        estimator.integrate(100.0, 100.0);

        // 20 degrees counter-clockwise: left wheel back, right wheel forward
        let arc = wheel_degrees(PI * TRACK * 20.0 / 360.0);
        let pose = estimator.integrate(100.0 - arc, 100.0 + arc);

        assert!((pose.heading - 10.0).abs() < 1e-9);
        assert!((pose.x - 10.0).abs() < 1e-9);
        assert!((pose.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn set_pose_keeps_integrating_from_new_value() {
        let estimator = PoseEstimator::new(Pose::origin(), RADIUS, TRACK);
        estimator.integrate(0.0, 0.0);
        let d = wheel_degrees(10.0);
        estimator.integrate(d, d);

        estimator.set_pose(Pose::new(60.6, 5.0, 90.0));
        let pose = estimator.integrate(2.0 * d, 2.0 * d);

        assert!((pose.x - 60.6).abs() < 1e-9);
        assert!((pose.y - 15.0).abs() < 1e-9);
    }

    #[test]
    fn update_normalizes_heading() {
        let estimator = PoseEstimator::new(Pose::origin(), RADIUS, TRACK);
        estimator.update(|pose| pose.heading = -90.0);
        assert_eq!(estimator.get_pose().heading, 270.0);
    }

    #[test]
    fn clones_share_state() {
        let estimator = PoseEstimator::new(Pose::origin(), RADIUS, TRACK);
        let other = estimator.clone();
        other.set_pose(Pose::new(1.0, 2.0, 3.0));
        assert_eq!(estimator.get_pose(), Pose::new(1.0, 2.0, 3.0));
    }
}
