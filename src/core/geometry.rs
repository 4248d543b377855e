// core/geometry.rs

// Planar primitives shared by every layer: points, axis-aligned zones built from
// tile indices, heading arithmetic in degrees, and grid-line snapping.
// Headings are measured counter-clockwise from +X: 0 = +X, 90 = +Y.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Arena position, in the same linear unit as the grid spacing
pub type Point = Point2<f64>;

/// Euclidean distance between two points
pub fn distance(a: &Point, b: &Point) -> f64 {
    nalgebra::distance(a, b)
}

/// Wraps a heading into [0, 360)
pub fn normalize_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed rotation from `from` to `to` along the shorter way, in (-180, 180]
pub fn minimal_delta(from: f64, to: f64) -> f64 {
    let delta = normalize_heading(to - from);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Heading of the segment from `from` to `to`
pub fn bearing(from: &Point, to: &Point) -> f64 {
    normalize_heading((to.y - from.y).atan2(to.x - from.x).to_degrees())
}

/// Distance between ruled lines; one constant for the whole arena
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridSpacing(f64);

impl GridSpacing {
    /// Creates a spacing; callers validate positivity through the config
    pub fn new(spacing: f64) -> Self {
        GridSpacing(spacing)
    }

    /// Raw spacing value
    pub fn value(self) -> f64 {
        self.0
    }

    /// Coordinate of a tile boundary
    pub fn tile(self, index: i32) -> f64 {
        index as f64 * self.0
    }

    /// Nearest ruled line to a coordinate
    pub fn nearest_line(self, coordinate: f64) -> f64 {
        (coordinate / self.0).round() * self.0
    }
}

/// Integer tile coordinate as given by the mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileIndex {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl TileIndex {
    /// Creates a tile index
    pub fn new(x: i32, y: i32) -> Self {
        TileIndex { x, y }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Lower X bound
    pub x_min: f64,
    /// Lower Y bound
    pub y_min: f64,
    /// Upper X bound
    pub x_max: f64,
    /// Upper Y bound
    pub y_max: f64,
}

impl Zone {
    /// Rectangle spanned by two opposite corners, in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        Zone {
            x_min: a.x.min(b.x),
            y_min: a.y.min(b.y),
            x_max: a.x.max(b.x),
            y_max: a.y.max(b.y),
        }
    }

    /// Rectangle between the lower-left corners of two tiles
    pub fn from_tiles(lower: TileIndex, upper: TileIndex, spacing: GridSpacing) -> Self {
        Zone::from_corners(
            Point::new(spacing.tile(lower.x), spacing.tile(lower.y)),
            Point::new(spacing.tile(upper.x), spacing.tile(upper.y)),
        )
    }

    /// The single tile whose lower-left corner is `tile`
    pub fn tile(tile: TileIndex, spacing: GridSpacing) -> Self {
        Zone::from_tiles(tile, TileIndex::new(tile.x + 1, tile.y + 1), spacing)
    }

    /// Grows the rectangle by `margin` on every side
    pub fn padded(&self, margin: f64) -> Self {
        Zone {
            x_min: self.x_min - margin,
            y_min: self.y_min - margin,
            x_max: self.x_max + margin,
            y_max: self.y_max + margin,
        }
    }

    /// Strict interior test; the boundary itself is outside
    pub fn contains(&self, p: &Point) -> bool {
        p.x > self.x_min && p.x < self.x_max && p.y > self.y_min && p.y < self.y_max
    }

    /// Extent along X
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Extent along Y
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Center of the rectangle
    pub fn mid(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Middle of the rectangle rounded down to whole tiles, so it always lies
    /// on ruled lines when the bounds do
    pub fn grid_mid(&self, spacing: GridSpacing) -> Point {
        let half = |min: f64, max: f64| {
            let tiles = ((max - min) / spacing.value()).round();
            spacing.nearest_line(min) + (tiles / 2.0).floor() * spacing.value()
        };
        Point::new(half(self.x_min, self.x_max), half(self.y_min, self.y_max))
    }

    /// Lower-left corner
    pub fn lower_left(&self) -> Point {
        Point::new(self.x_min, self.y_min)
    }

    /// Upper-right corner
    pub fn upper_right(&self) -> Point {
        Point::new(self.x_max, self.y_max)
    }

    /// Center of the tile at the lower-left of `tile`
    pub fn tile_center(tile: TileIndex, spacing: GridSpacing) -> Point {
        Zone::tile(tile, spacing).mid()
    }

    /// Maps both corners through a rigid transform that keeps axes axis-aligned
    /// (a rotation by a multiple of 90 degrees) and re-sorts the bounds.
    pub fn transformed(&self, f: impl Fn(&Point) -> Point) -> Self {
        Zone::from_corners(f(&self.lower_left()), f(&self.upper_right()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EPS: f64 = 1e-9;

    #[rstest]
    #[case(350.0, 10.0, 20.0)]
    #[case(10.0, 350.0, -20.0)]
    #[case(0.0, 180.0, 180.0)]
    #[case(180.0, 0.0, 180.0)]
    #[case(90.0, 269.0, 179.0)]
    #[case(90.0, 271.0, -179.0)]
    #[case(45.0, 45.0, 0.0)]
    #[case(0.0, -90.0, -90.0)]
    #[case(720.0, 30.0, 30.0)]
    fn minimal_delta_takes_the_short_way(#[case] from: f64, #[case] to: f64, #[case] expected: f64) {
        let delta = minimal_delta(from, to);
        assert!((delta - expected).abs() < EPS, "{} -> {} gave {}", from, to, delta);
        assert!(delta > -180.0 && delta <= 180.0);
    }

    #[test]
    fn minimal_delta_is_never_the_long_way_round() {
        let mut from = 0.0;
        while from < 360.0 {
            let mut to = -360.0;
            while to < 720.0 {
                let delta = minimal_delta(from, to);
                assert!(delta > -180.0 && delta <= 180.0);
                let residual = (from + delta - to).rem_euclid(360.0);
                assert!(residual < 1e-6 || residual > 360.0 - 1e-6);
                to += 13.0;
            }
            from += 11.0;
        }
    }

    #[rstest]
    #[case(-90.0, 270.0)]
    #[case(360.0, 0.0)]
    #[case(725.0, 5.0)]
    #[case(-1e-17, 0.0)]
    fn headings_are_normalized(#[case] raw: f64, #[case] expected: f64) {
        let h = normalize_heading(raw);
        assert!((h - expected).abs() < EPS);
        assert!((0.0..360.0).contains(&h));
    }

    #[test]
    fn distance_is_a_metric() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(-12.5, 7.25),
            Point::new(60.6, -121.2),
        ];
        for a in &points {
            assert_eq!(distance(a, a), 0.0);
            for b in &points {
                assert!((distance(a, b) - distance(b, a)).abs() < EPS);
                for c in &points {
                    assert!(distance(a, c) <= distance(a, b) + distance(b, c) + EPS);
                }
            }
        }
        assert!((distance(&points[0], &points[1]) - 5.0).abs() < EPS);
    }

    #[test]
    fn search_zone_from_tiles() {
        let spacing = GridSpacing::new(30.3);
        let zone = Zone::from_tiles(TileIndex::new(2, 2), TileIndex::new(4, 4), spacing);

        assert!((zone.x_min - 60.6).abs() < EPS);
        assert!((zone.y_min - 60.6).abs() < EPS);
        assert!((zone.x_max - 121.2).abs() < EPS);
        assert!((zone.y_max - 121.2).abs() < EPS);
        assert!((zone.mid().x - 90.9).abs() < EPS);
        assert!((zone.mid().y - 90.9).abs() < EPS);
        // half the cross-axis extent keeps the far wall out of the sweep
        assert!((zone.height() / 2.0 - 30.3).abs() < EPS);
    }

    #[rstest]
    #[case((2, 2), (4, 4), 90.9, 90.9)]
    #[case((2, 2), (5, 5), 90.9, 90.9)]
    #[case((1, 2), (4, 7), 60.6, 121.2)]
    fn grid_mid_lands_on_lines(
        #[case] lower: (i32, i32),
        #[case] upper: (i32, i32),
        #[case] x: f64,
        #[case] y: f64,
    ) {
        let spacing = GridSpacing::new(30.3);
        let zone = Zone::from_tiles(
            TileIndex::new(lower.0, lower.1),
            TileIndex::new(upper.0, upper.1),
            spacing,
        );
        let mid = zone.grid_mid(spacing);
        assert!((mid.x - x).abs() < EPS, "{:?}", mid);
        assert!((mid.y - y).abs() < EPS, "{:?}", mid);
        assert!((spacing.nearest_line(mid.x) - mid.x).abs() < EPS);
        assert!((spacing.nearest_line(mid.y) - mid.y).abs() < EPS);
    }

    #[test]
    fn padded_exclusion_tile() {
        let zone = Zone::tile(TileIndex::new(5, 5), GridSpacing::new(30.3)).padded(5.0);
        assert!((zone.x_min - 146.5).abs() < EPS);
        assert!((zone.x_max - 186.8).abs() < EPS);
        assert!(zone.contains(&Point::new(150.0, 180.0)));
        assert!(!zone.contains(&Point::new(146.0, 150.0)));
    }

    #[rstest]
    #[case(44.0, 30.3)]
    #[case(46.0, 60.6)]
    #[case(-10.0, 0.0)]
    #[case(-16.0, -30.3)]
    fn nearest_line_rounds_to_the_closest_multiple(#[case] raw: f64, #[case] line: f64) {
        let spacing = GridSpacing::new(30.3);
        let snapped = spacing.nearest_line(raw);
        assert!((snapped - line).abs() < EPS);
        assert!((snapped - raw).abs() <= spacing.value() / 2.0);
    }

    #[test]
    fn bearing_follows_heading_convention() {
        let origin = Point::new(10.0, 10.0);
        assert!((bearing(&origin, &Point::new(20.0, 10.0)) - 0.0).abs() < EPS);
        assert!((bearing(&origin, &Point::new(10.0, 20.0)) - 90.0).abs() < EPS);
        assert!((bearing(&origin, &Point::new(0.0, 10.0)) - 180.0).abs() < EPS);
        assert!((bearing(&origin, &Point::new(10.0, 0.0)) - 270.0).abs() < EPS);
    }
}
