//! Kinematics, collision and ray casting for the simulated arena
//!
//! The robot is a circle driven by two wheels; wheel commands are integrated
//! in fixed steps. A step that would push the circle into an obstacle or the
//! arena wall is rejected and the wheels stop, as a stalled motor would.

use super::SimConfig;
use crate::core::geometry::{GridSpacing, Point, Zone, minimal_delta, normalize_heading};
use crate::core::localization::Pose;
use crate::devices::{ColorId, Side};
use std::time::Duration;

/// Active wheel command
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum WheelCommand {
    Idle,
    /// Continuous wheel speeds (deg/s)
    Speed { left: f64, right: f64 },
    /// Remaining relative rotation per wheel (deg) at `speed` deg/s
    Rotate { left: f64, right: f64, speed: f64 },
}

/// A colored block on the arena floor
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimBlock {
    pub position: Point,
    pub color: ColorId,
    pub size: f64,
}

impl SimBlock {
    fn footprint(&self) -> Zone {
        let half = self.size / 2.0;
        Zone {
            x_min: self.position.x - half,
            y_min: self.position.y - half,
            x_max: self.position.x + half,
            y_max: self.position.y + half,
        }
    }
}

/// Everything the simulated devices read and write
pub(crate) struct SimState {
    pub config: SimConfig,
    pub wheel_radius: f64,
    pub track_width: f64,
    pub spacing: GridSpacing,
    pub pose: Pose,
    pub tacho: (f64, f64),
    pub command: WheelCommand,
    pub blocks: Vec<SimBlock>,
    pub jaws: [f64; 2],
    pub carried: Option<usize>,
    pub clock: Duration,
    pub collisions: usize,
}

impl SimState {
    pub fn new(config: SimConfig, wheel_radius: f64, track_width: f64, spacing: GridSpacing) -> Self {
        let blocks = config
            .blocks
            .iter()
            .map(|b| SimBlock {
                position: Point::new(b.x, b.y),
                color: b.color,
                size: b.size,
            })
            .collect();
        SimState {
            pose: config.start,
            config,
            wheel_radius,
            track_width,
            spacing,
            tacho: (0.0, 0.0),
            command: WheelCommand::Idle,
            blocks,
            jaws: [0.0, 0.0],
            carried: None,
            clock: Duration::ZERO,
            collisions: 0,
        }
    }

    /// Advances the wheels by `dt`
    pub fn step(&mut self, dt: Duration) {
        self.clock += dt;
        let secs = dt.as_secs_f64();
        let (dl, dr, finished) = match self.command {
            WheelCommand::Idle => return,
            WheelCommand::Speed { left, right } => (left * secs, right * secs, false),
            WheelCommand::Rotate { left, right, speed } => {
                let remaining = left.abs().max(right.abs());
                let budget = speed.abs() * secs;
                if remaining <= budget {
                    (left, right, true)
                } else {
                    let f = budget / remaining;
                    (left * f, right * f, false)
                }
            }
        };

        let sl = dl.to_radians() * self.wheel_radius;
        let sr = dr.to_radians() * self.wheel_radius;
        let d = (sl + sr) / 2.0;
        let dtheta = (sr - sl) / self.track_width;
        let mid = self.pose.heading.to_radians() + dtheta / 2.0;
        let next = Point::new(self.pose.x + d * mid.cos(), self.pose.y + d * mid.sin());

        if d != 0.0 {
            let before = self.clearance(&self.pose.position());
            let after = self.clearance(&next);
            if after < self.config.robot_radius && after < before {
                log::debug!(
                    "Simulated robot stalled at ({:.1}, {:.1})",
                    self.pose.x,
                    self.pose.y
                );
                self.command = WheelCommand::Idle;
                self.collisions += 1;
                return;
            }
        }

        self.pose = Pose::new(
            next.x,
            next.y,
            self.pose.heading + dtheta.to_degrees(),
        );
        self.tacho.0 += dl;
        self.tacho.1 += dr;

        self.command = match self.command {
            WheelCommand::Rotate { .. } if finished => WheelCommand::Idle,
            WheelCommand::Rotate { left, right, speed } => WheelCommand::Rotate {
                left: left - dl,
                right: right - dr,
                speed,
            },
            other => other,
        };
    }

    /// Distance from `p` to the nearest obstacle or arena wall
    fn clearance(&self, p: &Point) -> f64 {
        let arena = &self.config.arena;
        let walls = (p.x - arena.x_min)
            .min(arena.x_max - p.x)
            .min(p.y - arena.y_min)
            .min(arena.y_max - p.y);
        self.config
            .obstacles
            .iter()
            .map(|zone| distance_to_rect(p, zone))
            .fold(walls, f64::min)
    }

    /// Mounting point of a sensor at (`forward`, `lateral`) from the rotation
    /// center; `lateral` is mirrored for the right side
    fn mount(&self, side: Side, forward: f64, lateral: f64) -> Point {
        let lateral = match side {
            Side::Left => lateral,
            Side::Right => -lateral,
        };
        let h = self.pose.heading.to_radians();
        Point::new(
            self.pose.x + forward * h.cos() - lateral * h.sin(),
            self.pose.y + forward * h.sin() + lateral * h.cos(),
        )
    }

    /// Range reading of one forward sensor: the nearest hit across its cone
    pub fn range(&self, side: Side) -> f64 {
        let origin = self.mount(side, self.config.range_forward, self.config.range_lateral);
        let rays = self.config.cone_rays.max(1);
        let half = self.config.cone_half_angle;
        (0..rays)
            .map(|k| {
                let offset = if rays == 1 {
                    0.0
                } else {
                    -half + 2.0 * half * k as f64 / (rays - 1) as f64
                };
                self.cast(&origin, self.pose.heading + offset)
            })
            .fold(self.config.max_range, f64::min)
    }

    fn cast(&self, origin: &Point, heading: f64) -> f64 {
        let (dy, dx) = heading.to_radians().sin_cos();
        let arena = &self.config.arena;
        let mut nearest = self.config.max_range;

        // arena walls from the inside
        if dx > 1e-12 {
            nearest = nearest.min((arena.x_max - origin.x) / dx);
        } else if dx < -1e-12 {
            nearest = nearest.min((arena.x_min - origin.x) / dx);
        }
        if dy > 1e-12 {
            nearest = nearest.min((arena.y_max - origin.y) / dy);
        } else if dy < -1e-12 {
            nearest = nearest.min((arena.y_min - origin.y) / dy);
        }

        let visible = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| self.carried != Some(*i))
            .map(|(_, block)| block.footprint());
        for zone in self.config.obstacles.iter().copied().chain(visible) {
            if let Some(t) = ray_rect(origin, dx, dy, &zone) {
                nearest = nearest.min(t);
            }
        }
        nearest.max(0.0)
    }

    /// Raw light reading: darker over a ruled line
    pub fn light(&self, side: Side) -> f64 {
        let p = self.mount(side, self.config.light_forward, self.config.light_lateral);
        let half = self.config.line_width / 2.0;
        let on_line = (p.x - self.spacing.nearest_line(p.x)).abs() <= half
            || (p.y - self.spacing.nearest_line(p.y)).abs() <= half;
        if on_line {
            self.config.light_line
        } else {
            self.config.light_ambient
        }
    }

    /// Nearest uncarried block in front within reach, as `(index, distance)`
    fn block_within(&self, reach: f64, front_only: bool) -> Option<(usize, f64)> {
        let center = self.pose.position();
        self.blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| self.carried != Some(*i))
            .filter_map(|(i, block)| {
                let d = nalgebra::distance(&center, &block.position);
                let bearing = (block.position.y - center.y)
                    .atan2(block.position.x - center.x)
                    .to_degrees();
                let ahead = minimal_delta(self.pose.heading, bearing).abs() <= 45.0;
                (d <= reach && (ahead || !front_only)).then_some((i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Color of the block facing the classifier
    pub fn classify(&self) -> Option<ColorId> {
        let reach = self.config.robot_radius + self.config.classify_reach;
        self.block_within(reach, true)
            .map(|(i, _)| self.blocks[i].color)
    }

    /// Moves one jaw; closing both picks up the nearest block, opening drops it
    pub fn set_jaw(&mut self, side: Side, angle: f64) {
        let index = match side {
            Side::Left => 0,
            Side::Right => 1,
        };
        self.jaws[index] = angle;
        let closed = self.jaws.iter().all(|&a| a <= self.config.grip_angle);

        match (closed, self.carried) {
            (true, None) => {
                if let Some((i, _)) = self.block_within(self.config.grab_reach, false) {
                    log::debug!("Simulated gripper holding block {}", i);
                    self.carried = Some(i);
                }
            }
            (false, Some(i)) => {
                let h = self.pose.heading.to_radians();
                let back = self.config.robot_radius + 4.0;
                self.blocks[i].position =
                    Point::new(self.pose.x - back * h.cos(), self.pose.y - back * h.sin());
                self.carried = None;
                log::debug!(
                    "Simulated gripper released block {} at ({:.1}, {:.1})",
                    i,
                    self.blocks[i].position.x,
                    self.blocks[i].position.y
                );
            }
            _ => {}
        }
    }

    /// Heading normalized for reporting
    pub fn heading(&self) -> f64 {
        normalize_heading(self.pose.heading)
    }
}

fn distance_to_rect(p: &Point, zone: &Zone) -> f64 {
    let dx = (zone.x_min - p.x).max(0.0).max(p.x - zone.x_max);
    let dy = (zone.y_min - p.y).max(0.0).max(p.y - zone.y_max);
    dx.hypot(dy)
}

/// Slab intersection; None when the ray misses or starts inside
fn ray_rect(origin: &Point, dx: f64, dy: f64, zone: &Zone) -> Option<f64> {
    if zone.contains(origin) {
        return None;
    }
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    for (o, d, lo, hi) in [
        (origin.x, dx, zone.x_min, zone.x_max),
        (origin.y, dy, zone.y_min, zone.y_max),
    ] {
        if d.abs() < 1e-12 {
            if o < lo || o > hi {
                return None;
            }
        } else {
            let (a, b) = ((lo - o) / d, (hi - o) / d);
            t_min = t_min.max(a.min(b));
            t_max = t_max.min(a.max(b));
        }
    }
    (t_max >= t_min && t_min >= 0.0).then_some(t_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(obstacles: Vec<Zone>) -> SimState {
        let config = SimConfig {
            obstacles,
            cone_rays: 1,
            ..SimConfig::default()
        };
        SimState::new(config, 2.1, 17.25, GridSpacing::new(30.3))
    }

    #[test]
    fn ray_hits_the_near_face() {
        let zone = Zone { x_min: 10.0, y_min: -5.0, x_max: 20.0, y_max: 5.0 };
        let t = ray_rect(&Point::new(0.0, 0.0), 1.0, 0.0, &zone).unwrap();
        assert!((t - 10.0).abs() < 1e-9);
        assert!(ray_rect(&Point::new(0.0, 0.0), -1.0, 0.0, &zone).is_none());
        assert!(ray_rect(&Point::new(0.0, 10.0), 1.0, 0.0, &zone).is_none());
    }

    #[test]
    fn range_reading_sees_an_obstacle_ahead() {
        let sim = state(vec![Zone { x_min: 40.0, y_min: -20.0, x_max: 50.0, y_max: 20.0 }]);
        // sensors sit 5 ahead of the center
        assert!((sim.range(Side::Left) - 35.0).abs() < 1e-9);
        assert!((sim.range(Side::Right) - 35.0).abs() < 1e-9);
    }

    #[test]
    fn driving_into_an_obstacle_stalls() {
        let mut sim = state(vec![Zone { x_min: 20.0, y_min: -20.0, x_max: 30.0, y_max: 20.0 }]);
        sim.command = WheelCommand::Speed { left: 300.0, right: 300.0 };
        for _ in 0..1000 {
            sim.step(Duration::from_millis(5));
        }
        assert_eq!(sim.command, WheelCommand::Idle);
        assert!(sim.collisions > 0);
        assert!(sim.pose.x <= 20.0 - sim.config.robot_radius + 1e-9);
    }

    #[test]
    fn rotation_command_finishes_exactly() {
        let mut sim = state(Vec::new());
        // 90 degrees counter-clockwise in place
        let wheel = 17.25 * 90.0 / (2.0 * 2.1);
        sim.command = WheelCommand::Rotate { left: -wheel, right: wheel, speed: 150.0 };
        for _ in 0..2000 {
            sim.step(Duration::from_millis(5));
        }
        assert_eq!(sim.command, WheelCommand::Idle);
        assert!((sim.heading() - 90.0).abs() < 1e-6);
        assert!(sim.pose.x.abs() < 1e-9);
    }
}
