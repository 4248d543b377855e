// search/scan.rs

// Scan origins for the zone sweep. Origins walk along the zone's long axis in
// fixed steps, bounce off the far usable end, walk back, and stop once the pass
// budget is spent. Each origin comes with the angular window swept there.

use crate::config::SearchConfig;
use crate::core::geometry::{Point, Zone};

/// Axis the scan origins move along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAxis {
    /// Origins move along X
    X,
    /// Origins move along Y
    Y,
}

impl ScanAxis {
    /// Long axis of the zone; X on ties
    pub fn of(zone: &Zone) -> ScanAxis {
        if zone.height() > zone.width() {
            ScanAxis::Y
        } else {
            ScanAxis::X
        }
    }

    /// Heading that points along the axis
    pub fn heading(self) -> f64 {
        match self {
            ScanAxis::X => 0.0,
            ScanAxis::Y => 90.0,
        }
    }
}

/// Direction the origins are currently moving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    /// Away from the near edge
    Forward,
    /// Back toward the near edge
    Reverse,
}

/// One scan origin and its angular window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanCycle {
    /// Where the robot stands while sweeping
    pub origin: Point,
    /// Distance of the origin from the zone's near edge along the axis
    pub offset: f64,
    /// Direction of travel along the axis
    pub direction: SweepDirection,
    /// First heading of the window (exclusive)
    pub start: f64,
    /// Last heading of the window
    pub end: f64,
}

/// Sequence of scan cycles covering a zone
#[derive(Debug, Clone)]
pub struct ScanPlan {
    zone: Zone,
    axis: ScanAxis,
    max_object_distance: f64,
    step: f64,
    lo: f64,
    hi: f64,
    max_passes: u32,
    next: Option<(f64, SweepDirection)>,
    flips: u32,
}

impl ScanPlan {
    /// Plans the sweep of `zone`
    pub fn new(zone: &Zone, config: &SearchConfig) -> Self {
        let axis = ScanAxis::of(zone);
        let (extent, cross) = match axis {
            ScanAxis::X => (zone.width(), zone.height()),
            ScanAxis::Y => (zone.height(), zone.width()),
        };
        // anything farther than half the cross extent may be the zone's far wall
        let max_object_distance = cross / 2.0;
        let hi = (extent - max_object_distance).max(0.0);
        let lo = max_object_distance.min(hi);
        let first = config.zone_margin.min(hi);

        ScanPlan {
            zone: *zone,
            axis,
            max_object_distance,
            step: config.offset_step,
            lo,
            hi,
            max_passes: config.max_passes.max(1),
            next: Some((first, SweepDirection::Forward)),
            flips: 0,
        }
    }

    /// Readings beyond this are not objects
    pub fn max_object_distance(&self) -> f64 {
        self.max_object_distance
    }

    /// Axis the origins move along
    pub fn axis(&self) -> ScanAxis {
        self.axis
    }

    /// Drop-off spot for rejected objects: the zone's near edge, halfway across
    pub fn reject_point(&self) -> Point {
        let mid = self.zone.mid();
        match self.axis {
            ScanAxis::X => Point::new(self.zone.x_min, mid.y),
            ScanAxis::Y => Point::new(mid.x, self.zone.y_min),
        }
    }

    fn cycle_at(&self, offset: f64, direction: SweepDirection) -> ScanCycle {
        let mid = self.zone.mid();
        let origin = match self.axis {
            ScanAxis::X => Point::new(self.zone.x_min + offset, mid.y),
            ScanAxis::Y => Point::new(mid.x, self.zone.y_min + offset),
        };
        let a = self.axis.heading();
        let (start, end) = match direction {
            SweepDirection::Forward => (a - 90.0, a + 90.0),
            SweepDirection::Reverse => (a + 90.0, a + 270.0),
        };
        ScanCycle {
            origin,
            offset,
            direction,
            start,
            end,
        }
    }

    fn advance(&mut self, offset: f64, direction: SweepDirection) {
        self.next = match direction {
            SweepDirection::Forward => {
                let offset = offset + self.step;
                if offset >= self.hi {
                    self.flip().map(|()| (self.hi, SweepDirection::Reverse))
                } else {
                    Some((offset, SweepDirection::Forward))
                }
            }
            SweepDirection::Reverse => {
                let offset = offset - self.step;
                if offset <= self.lo {
                    self.flip().map(|()| (self.lo, SweepDirection::Forward))
                } else {
                    Some((offset, SweepDirection::Reverse))
                }
            }
        };
    }

    fn flip(&mut self) -> Option<()> {
        self.flips += 1;
        (self.flips < self.max_passes).then_some(())
    }
}

impl Iterator for ScanPlan {
    type Item = ScanCycle;

    fn next(&mut self) -> Option<ScanCycle> {
        let (offset, direction) = self.next?;
        self.advance(offset, direction);
        Some(self.cycle_at(offset, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{GridSpacing, TileIndex};

    const EPS: f64 = 1e-9;

    fn zone(lower: (i32, i32), upper: (i32, i32)) -> Zone {
        Zone::from_tiles(
            TileIndex::new(lower.0, lower.1),
            TileIndex::new(upper.0, upper.1),
            GridSpacing::new(30.3),
        )
    }

    #[test]
    fn two_tile_square_zone() {
        let plan = ScanPlan::new(&zone((2, 2), (4, 4)), &SearchConfig::default());
        assert!((plan.max_object_distance() - 30.3).abs() < EPS);
        assert_eq!(plan.axis(), ScanAxis::X);

        let cycles: Vec<ScanCycle> = plan.collect();
        let offsets: Vec<(f64, SweepDirection)> =
            cycles.iter().map(|c| (c.offset, c.direction)).collect();
        assert_eq!(offsets.len(), 3);
        assert!((offsets[0].0 - 7.0).abs() < EPS);
        assert!((offsets[1].0 - 27.0).abs() < EPS);
        assert!((offsets[2].0 - 30.3).abs() < EPS);
        assert_eq!(offsets[2].1, SweepDirection::Reverse);

        assert!((cycles[0].origin.x - 67.6).abs() < EPS);
        assert!((cycles[0].origin.y - 90.9).abs() < EPS);
        assert_eq!((cycles[0].start, cycles[0].end), (-90.0, 90.0));
        assert_eq!((cycles[2].start, cycles[2].end), (90.0, 270.0));
    }

    #[test]
    fn next_walks_the_plan_and_then_stops() {
        let mut plan = ScanPlan::new(&zone((2, 2), (4, 4)), &SearchConfig::default());

        let first = plan.next().unwrap();
        assert_eq!(first.direction, SweepDirection::Forward);
        assert!((first.offset - 7.0).abs() < EPS);
        let second = plan.next().unwrap();
        assert!((second.origin.x - 87.6).abs() < EPS);
        let third = plan.next().unwrap();
        assert_eq!(third.direction, SweepDirection::Reverse);
        assert!((third.origin.x - 90.9).abs() < EPS);

        assert!(plan.next().is_none());
        assert!(plan.next().is_none());
    }

    #[test]
    fn offsets_are_monotonic_per_direction_and_bounded() {
        let plan = ScanPlan::new(&zone((1, 2), (7, 4)), &SearchConfig::default());
        let hi = 6.0 * 30.3 - 30.3;
        let cycles: Vec<ScanCycle> = plan.collect();
        assert!(cycles.len() > 4);

        for pair in cycles.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(b.offset <= hi + EPS);
            if a.direction == b.direction {
                match a.direction {
                    SweepDirection::Forward => assert!(b.offset > a.offset),
                    SweepDirection::Reverse => assert!(b.offset < a.offset),
                }
            }
        }
        assert!(cycles.iter().any(|c| c.direction == SweepDirection::Reverse));
    }

    #[test]
    fn tall_zone_scans_along_y() {
        let plan = ScanPlan::new(&zone((2, 1), (4, 6)), &SearchConfig::default());
        assert_eq!(plan.axis(), ScanAxis::Y);
        assert!((plan.reject_point().y - 30.3).abs() < EPS);

        let first = plan.clone().next().unwrap();
        assert!((first.origin.x - 90.9).abs() < EPS);
        assert!((first.origin.y - 37.3).abs() < EPS);
        assert_eq!((first.start, first.end), (0.0, 180.0));
    }
}
