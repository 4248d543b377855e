// src/navigation/reframe.rs
// One-shot change of coordinates before delivery. The router only ever drives
// toward increasing coordinates, so the robot moves to a staging point on the
// search zone's edge, faces the direction that makes the drop point lie ahead
// and to the left, and restarts its pose at the origin of that frame. The frame
// is a rigid motion, so nothing moves in the world; only the labels change.
// The staging point sits on a grid intersection and the rotation is a multiple
// of 90 degrees, so ruled lines stay at multiples of the spacing in the new frame.

use super::controller::{Completion, MotionController, TravelOutcome};
use crate::core::geometry::{normalize_heading, GridSpacing, Point, Zone};
use crate::core::localization::Pose;
use crate::devices::Drive;
use log::{info, warn};
use nalgebra::{Isometry2, Vector2};

/// Where the drop point lies relative to the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// Ahead on both axes
    NorthEast,
    /// Lower X, higher Y
    NorthWest,
    /// Higher X, lower Y
    SouthEast,
    /// Behind on both axes
    SouthWest,
}

impl Quadrant {
    /// Quadrant of `drop` as seen from `position`
    pub fn of(position: &Point, drop: &Point) -> Quadrant {
        match (position.x >= drop.x, position.y >= drop.y) {
            (true, true) => Quadrant::SouthWest,
            (false, true) => Quadrant::SouthEast,
            (true, false) => Quadrant::NorthWest,
            (false, false) => Quadrant::NorthEast,
        }
    }

    /// World heading that becomes canonical heading 0
    pub fn rotation(self) -> f64 {
        match self {
            Quadrant::NorthEast => 0.0,
            Quadrant::NorthWest => 90.0,
            Quadrant::SouthWest => 180.0,
            Quadrant::SouthEast => 270.0,
        }
    }

    /// Point on the zone's edge where the frame is re-based
    pub fn staging(self, zone: &Zone, spacing: GridSpacing) -> Point {
        let mid = zone.grid_mid(spacing);
        match self {
            Quadrant::SouthWest => Point::new(zone.x_min, mid.y),
            Quadrant::SouthEast => Point::new(mid.x, zone.y_min),
            Quadrant::NorthWest => Point::new(mid.x, zone.y_max),
            Quadrant::NorthEast => Point::new(zone.x_max, mid.y),
        }
    }
}

/// Rigid transform between world coordinates and a canonical frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalFrame {
    world_from_canonical: Isometry2<f64>,
    rotation: f64,
}

impl CanonicalFrame {
    /// Frame whose origin sits at `origin` with +X along world heading `rotation`
    pub fn new(origin: Point, rotation: f64) -> Self {
        CanonicalFrame {
            world_from_canonical: Isometry2::new(
                Vector2::new(origin.x, origin.y),
                rotation.to_radians(),
            ),
            rotation: normalize_heading(rotation),
        }
    }

    /// The world frame itself
    pub fn identity() -> Self {
        CanonicalFrame::new(Point::origin(), 0.0)
    }

    /// World heading of canonical +X
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// World point in canonical coordinates
    pub fn to_canonical(&self, p: &Point) -> Point {
        self.world_from_canonical.inverse_transform_point(p)
    }

    /// Canonical point in world coordinates
    pub fn to_world(&self, p: &Point) -> Point {
        self.world_from_canonical.transform_point(p)
    }

    /// World rectangle in canonical coordinates
    pub fn zone_to_canonical(&self, zone: &Zone) -> Zone {
        zone.transformed(|p| self.to_canonical(p))
    }

    /// Canonical pose in world coordinates
    pub fn pose_to_world(&self, pose: &Pose) -> Pose {
        let p = self.to_world(&pose.position());
        Pose::new(p.x, p.y, pose.heading + self.rotation)
    }

    /// World pose in canonical coordinates
    pub fn pose_to_canonical(&self, pose: &Pose) -> Pose {
        let p = self.to_canonical(&pose.position());
        Pose::new(p.x, p.y, pose.heading - self.rotation)
    }
}

/// Result of re-basing the frame
#[derive(Debug, Clone, Copy)]
pub struct Reframing {
    /// Quadrant the drop point was in
    pub quadrant: Quadrant,
    /// The new frame
    pub frame: CanonicalFrame,
    /// Drop point in the new frame
    pub drop: Point,
    /// Exclusion zone in the new frame
    pub exclusion: Option<Zone>,
    /// Search zone in the new frame
    pub search_zone: Zone,
}

/// Re-bases the pose so the drop point is reached by increasing coordinates
#[derive(Debug, Clone, Copy)]
pub struct CoordinateReframer {
    spacing: GridSpacing,
}

impl CoordinateReframer {
    /// Creates a reframer for an arena ruled at `spacing`
    pub fn new(spacing: GridSpacing) -> Self {
        CoordinateReframer { spacing }
    }

    /// Drives to the staging point, faces the canonical heading and resets
    /// the pose to the origin. Whatever the travel and turn left over stays in
    /// the estimate, relabeled into the new frame.
    pub fn reframe<D: Drive>(
        &self,
        motion: &mut MotionController<D>,
        search_zone: &Zone,
        drop: Point,
        exclusion: Option<Zone>,
    ) -> Reframing {
        let pose = motion.pose();
        let quadrant = Quadrant::of(&pose.position(), &drop);
        let staging = quadrant.staging(search_zone, self.spacing);
        info!(
            "Drop point is {:?} of ({:.1}, {:.1}); staging at ({:.1}, {:.1})",
            quadrant, pose.x, pose.y, staging.x, staging.y
        );

        if let TravelOutcome::NotConverged { error } =
            motion.travel_to(staging.x, staging.y, Completion::Block)
        {
            warn!("Staging point missed by {:.1}", error);
        }
        motion.turn_to(quadrant.rotation());

        let frame = CanonicalFrame::new(staging, quadrant.rotation());
        let here = motion.estimator().update(|pose| {
            let world = *pose;
            *pose = frame.pose_to_canonical(&world);
            world
        });

        let reframing = Reframing {
            quadrant,
            frame,
            drop: frame.to_canonical(&drop),
            exclusion: exclusion.map(|zone| frame.zone_to_canonical(&zone)),
            search_zone: frame.zone_to_canonical(search_zone),
        };
        info!(
            "Canonical frame at ({:.1}, {:.1}) facing {:.0}, robot at ({:.1}, {:.1}); drop at ({:.1}, {:.1})",
            staging.x,
            staging.y,
            quadrant.rotation(),
            here.x,
            here.y,
            reframing.drop.x,
            reframing.drop.y
        );
        reframing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EPS: f64 = 1e-9;

    #[rstest]
    #[case(Point::new(90.9, 90.9), Point::new(227.25, 227.25), Quadrant::NorthEast, 0.0)]
    #[case(Point::new(90.9, 90.9), Point::new(15.15, 227.25), Quadrant::NorthWest, 90.0)]
    #[case(Point::new(90.9, 90.9), Point::new(15.15, 15.15), Quadrant::SouthWest, 180.0)]
    #[case(Point::new(90.9, 90.9), Point::new(227.25, 45.45), Quadrant::SouthEast, 270.0)]
    fn quadrant_and_rotation(
        #[case] robot: Point,
        #[case] drop: Point,
        #[case] quadrant: Quadrant,
        #[case] rotation: f64,
    ) {
        let q = Quadrant::of(&robot, &drop);
        assert_eq!(q, quadrant);
        assert_eq!(q.rotation(), rotation);
    }

    #[rstest]
    #[case(Point::new(227.25, 227.25))]
    #[case(Point::new(15.15, 227.25))]
    #[case(Point::new(15.15, 15.15))]
    #[case(Point::new(227.25, 45.45))]
    fn drop_lies_ahead_in_the_canonical_frame(#[case] drop: Point) {
        let zone = Zone {
            x_min: 60.6,
            y_min: 60.6,
            x_max: 121.2,
            y_max: 121.2,
        };
        let quadrant = Quadrant::of(&zone.mid(), &drop);
        let frame = CanonicalFrame::new(
            quadrant.staging(&zone, GridSpacing::new(30.3)),
            quadrant.rotation(),
        );
        let canonical = frame.to_canonical(&drop);
        assert!(canonical.x >= -EPS && canonical.y >= -EPS, "{:?}", canonical);
    }

    #[rstest]
    #[case(0.0)]
    #[case(90.0)]
    #[case(180.0)]
    #[case(270.0)]
    fn round_trip_recovers_the_point(#[case] rotation: f64) {
        let frame = CanonicalFrame::new(Point::new(90.9, 60.6), rotation);
        for p in [
            Point::new(0.0, 0.0),
            Point::new(227.25, 45.45),
            Point::new(-12.5, 300.0),
        ] {
            let back = frame.to_world(&frame.to_canonical(&p));
            assert!((back - p).norm() < 1e-9);
        }
    }

    #[test]
    fn zones_stay_axis_aligned_and_keep_their_size() {
        let frame = CanonicalFrame::new(Point::new(90.9, 60.6), 270.0);
        let zone = Zone {
            x_min: 146.5,
            y_min: 146.5,
            x_max: 186.8,
            y_max: 186.8,
        };
        let canonical = frame.zone_to_canonical(&zone);
        assert!((canonical.width() - zone.width()).abs() < EPS);
        assert!((canonical.height() - zone.height()).abs() < EPS);

        // the canonical origin is the staging point itself
        let origin = frame.to_world(&Point::origin());
        assert!((origin - Point::new(90.9, 60.6)).norm() < EPS);
    }

    #[rstest]
    #[case(Quadrant::NorthEast)]
    #[case(Quadrant::NorthWest)]
    #[case(Quadrant::SouthEast)]
    #[case(Quadrant::SouthWest)]
    fn odd_zone_keeps_lines_on_the_canonical_grid(#[case] quadrant: Quadrant) {
        // three tiles wide, so the true middle falls between two lines
        let spacing = GridSpacing::new(30.3);
        let zone = Zone {
            x_min: 60.6,
            y_min: 60.6,
            x_max: 151.5,
            y_max: 151.5,
        };
        let staging = quadrant.staging(&zone, spacing);
        let frame = CanonicalFrame::new(staging, quadrant.rotation());

        for (x, y) in [(181.8, 0.0), (0.0, 242.4), (90.9, 121.2)] {
            let line = frame.to_canonical(&Point::new(x, y));
            assert!((spacing.nearest_line(line.x) - line.x).abs() < 1e-6, "{:?}", line);
            assert!((spacing.nearest_line(line.y) - line.y).abs() < 1e-6, "{:?}", line);
        }
    }

    #[test]
    fn pose_relabel_round_trips() {
        let frame = CanonicalFrame::new(Point::new(90.9, 60.6), 90.0);
        let world = Pose::new(92.0, 59.0, 93.0);
        let canonical = frame.pose_to_canonical(&world);
        assert!((canonical.heading - 3.0).abs() < 1e-9);

        let back = frame.pose_to_world(&canonical);
        assert!((back.x - world.x).abs() < 1e-9);
        assert!((back.y - world.y).abs() < 1e-9);
        assert!((back.heading - world.heading).abs() < 1e-9);
    }

    #[test]
    fn canonical_pose_maps_back_to_world() {
        let frame = CanonicalFrame::new(Point::new(90.9, 60.6), 270.0);
        // canonical +X is world -Y
        let world = frame.pose_to_world(&Pose::new(10.0, 0.0, 0.0));
        assert!((world.x - 90.9).abs() < 1e-9);
        assert!((world.y - 50.6).abs() < 1e-9);
        assert!((world.heading - 270.0).abs() < 1e-9);
    }
}
