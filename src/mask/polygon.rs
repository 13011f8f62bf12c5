use crate::foundation::core::{BezPath, Point};
use crate::geometry::point_in_polygon;

/// Points needed before a polygon restricts rendering.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Ordered lasso points in canvas coordinates. The closing edge is implied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolygonPath {
    points: Vec<Point>,
}

impl PolygonPath {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn push(&mut self, p: Point) {
        if p.x.is_finite() && p.y.is_finite() {
            self.points.push(p);
        }
    }

    /// Replace all points, dropping non-finite ones.
    pub fn set(&mut self, points: impl IntoIterator<Item = Point>) {
        self.points = points
            .into_iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn is_usable(&self) -> bool {
        self.points.len() >= MIN_POLYGON_POINTS
    }

    /// Closed clip path, or `None` while fewer than three points exist.
    pub fn clip_path(&self) -> Option<BezPath> {
        if !self.is_usable() {
            return None;
        }
        let mut path = BezPath::new();
        path.move_to(self.points[0]);
        for &p in &self.points[1..] {
            path.line_to(p);
        }
        path.close_path();
        Some(path)
    }

    pub fn contains(&self, p: Point) -> bool {
        self.is_usable() && point_in_polygon(p, &self.points)
    }
}
