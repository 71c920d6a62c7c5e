//! Path geometry shared by path objects, clip paths and glyph outlines.

use crate::geometry::{Matrix, Point, Rect};
use serde::Serialize;

/// How a point continues the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PointKind {
    /// Starts a new subpath
    Move,
    /// Straight segment from the previous point
    Line,
    /// Bezier control or end point (in groups of three)
    Bezier,
}

/// A path point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathPoint {
    /// Position
    pub point: Point,
    /// Segment kind
    pub kind: PointKind,
    /// The subpath is closed after this point
    pub close: bool,
}

impl PathPoint {
    /// Create a point that does not close its subpath.
    pub fn new(point: Point, kind: PointKind) -> Self {
        Self {
            point,
            kind,
            close: false,
        }
    }
}

/// Fill rule requested by a painting operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FillType {
    /// No fill
    #[default]
    NoFill,
    /// Nonzero winding
    Winding,
    /// Even-odd
    EvenOdd,
}

impl FillType {
    /// True for either fill rule.
    pub fn is_fill(self) -> bool {
        self != FillType::NoFill
    }

    /// The tiny-skia fill rule.
    pub fn to_skia(self) -> tiny_skia::FillRule {
        match self {
            FillType::EvenOdd => tiny_skia::FillRule::EvenOdd,
            _ => tiny_skia::FillRule::Winding,
        }
    }
}

/// Line cap style (`J`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LineCap {
    /// Butt cap
    #[default]
    Butt,
    /// Round cap
    Round,
    /// Projecting square cap
    Square,
}

impl LineCap {
    /// From the PDF integer value; unknown values give butt caps.
    pub fn from_int(value: i32) -> Self {
        match value {
            1 => LineCap::Round,
            2 => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

/// Line join style (`j`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LineJoin {
    /// Miter join
    #[default]
    Miter,
    /// Round join
    Round,
    /// Bevel join
    Bevel,
}

impl LineJoin {
    /// From the PDF integer value; unknown values give miter joins.
    pub fn from_int(value: i32) -> Self {
        match value {
            1 => LineJoin::Round,
            2 => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }
}

/// A sequence of subpaths.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Path {
    points: Vec<PathPoint>,
}

impl Path {
    /// Create an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// The points of the path.
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the path has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point.
    pub fn append_point(&mut self, point: Point, kind: PointKind) {
        self.points.push(PathPoint::new(point, kind));
    }

    /// Append a full path point (keeps its close flag).
    pub fn append_path_point(&mut self, point: PathPoint) {
        self.points.push(point);
    }

    /// Append every point of another path.
    pub fn append(&mut self, other: &Path, matrix: Option<&Matrix>) {
        for p in &other.points {
            let mut p = *p;
            if let Some(m) = matrix {
                p.point = m.transform(p.point);
            }
            self.points.push(p);
        }
    }

    /// Append a closed rectangle as five points.
    pub fn append_rect(&mut self, left: f32, bottom: f32, right: f32, top: f32) {
        self.append_point(Point::new(left, bottom), PointKind::Move);
        self.append_point(Point::new(right, bottom), PointKind::Line);
        self.append_point(Point::new(right, top), PointKind::Line);
        self.append_point(Point::new(left, top), PointKind::Line);
        self.append_point(Point::new(left, bottom), PointKind::Line);
        self.close_figure();
    }

    /// Mark the last point as closing its subpath.
    pub fn close_figure(&mut self) {
        if let Some(last) = self.points.last_mut() {
            last.close = true;
        }
    }

    /// Mutable access to the last point.
    pub fn last_mut(&mut self) -> Option<&mut PathPoint> {
        self.points.last_mut()
    }

    /// Remove all points.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Transform every point in place.
    pub fn transform(&mut self, matrix: &Matrix) {
        for p in self.points.iter_mut() {
            p.point = matrix.transform(p.point);
        }
    }

    /// Bounding box of the points (control points included).
    pub fn bounding_box(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::default();
        };
        let mut rect = Rect::new(first.point.x, first.point.y, first.point.x, first.point.y);
        for p in &self.points[1..] {
            rect.update_point(p.point);
        }
        rect
    }

    /// Bounding box grown for a stroke of `line_width` with `miter_limit`.
    pub fn bounding_box_for_stroke(&self, line_width: f32, miter_limit: f32) -> Rect {
        let mut rect = self.bounding_box();
        if self.points.is_empty() {
            return rect;
        }
        let half = line_width / 2.0;
        let grow = if self.points.len() > 2 { half * miter_limit.max(1.0) } else { half };
        rect.inflate(grow, grow);
        rect
    }

    /// The rectangle drawn by this path, if it is a single axis-aligned rectangle.
    pub fn as_rect(&self) -> Option<Rect> {
        let pts = &self.points;
        if pts.len() != 5 && pts.len() != 4 {
            return None;
        }
        if pts[0].kind != PointKind::Move || pts[1..].iter().any(|p| p.kind != PointKind::Line) {
            return None;
        }
        if pts.len() == 5 && pts[4].point != pts[0].point {
            return None;
        }
        if pts.len() == 4 && !pts[3].close {
            return None;
        }
        let p = |i: usize| pts[i].point;
        let axis_aligned = (p(0).x == p(1).x && p(1).y == p(2).y && p(2).x == p(3).x && p(3).y == p(0).y)
            || (p(0).y == p(1).y && p(1).x == p(2).x && p(2).y == p(3).y && p(3).x == p(0).x);
        if !axis_aligned {
            return None;
        }
        Some(Rect::from_points(p(0).x, p(0).y, p(2).x, p(2).y))
    }

    /// Build a tiny-skia path, optionally transformed.
    ///
    /// Returns `None` for paths with no drawable segments.
    pub fn to_skia(&self, matrix: Option<&Matrix>) -> Option<tiny_skia::Path> {
        let mut builder = tiny_skia::PathBuilder::new();
        let tr = |p: Point| match matrix {
            Some(m) => m.transform(p),
            None => p,
        };
        let mut i = 0;
        let mut open = false;
        // A contour that never leaves its start point stays open so that
        // round and square caps still draw a dot.
        let mut start = Point::default();
        let mut degenerate = true;
        while i < self.points.len() {
            let pp = self.points[i];
            let p = tr(pp.point);
            match pp.kind {
                PointKind::Move => {
                    builder.move_to(p.x, p.y);
                    open = true;
                    start = pp.point;
                    degenerate = true;
                },
                PointKind::Line => {
                    if !open {
                        builder.move_to(p.x, p.y);
                        open = true;
                        start = pp.point;
                        degenerate = true;
                    } else {
                        builder.line_to(p.x, p.y);
                        degenerate &= pp.point == start;
                    }
                },
                PointKind::Bezier => {
                    if i + 2 < self.points.len() {
                        let c2 = tr(self.points[i + 1].point);
                        let end = tr(self.points[i + 2].point);
                        if !open {
                            builder.move_to(p.x, p.y);
                            open = true;
                            start = pp.point;
                        }
                        builder.cubic_to(p.x, p.y, c2.x, c2.y, end.x, end.y);
                        degenerate = false;
                        i += 2;
                    }
                },
            }
            if self.points[i].close {
                if !degenerate {
                    builder.close();
                }
                open = false;
            }
            i += 1;
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_rect() {
        let mut path = Path::new();
        path.append_rect(10.0, 10.0, 110.0, 110.0);
        assert_eq!(path.len(), 5);
        assert!(path.points()[4].close);
        assert_eq!(path.bounding_box(), Rect::new(10.0, 10.0, 110.0, 110.0));
        assert_eq!(path.as_rect(), Some(Rect::new(10.0, 10.0, 110.0, 110.0)));
    }

    #[test]
    fn test_triangle_is_not_rect() {
        let mut path = Path::new();
        path.append_point(Point::new(0.0, 0.0), PointKind::Move);
        path.append_point(Point::new(10.0, 0.0), PointKind::Line);
        path.append_point(Point::new(5.0, 10.0), PointKind::Line);
        path.close_figure();
        assert!(path.as_rect().is_none());
    }

    #[test]
    fn test_stroke_bounds() {
        let mut path = Path::new();
        path.append_point(Point::new(0.0, 0.0), PointKind::Move);
        path.append_point(Point::new(10.0, 0.0), PointKind::Line);
        let rect = path.bounding_box_for_stroke(2.0, 10.0);
        assert_eq!(rect, Rect::new(-1.0, -1.0, 11.0, 1.0));
    }

    #[test]
    fn test_transform() {
        let mut path = Path::new();
        path.append_rect(0.0, 0.0, 1.0, 1.0);
        path.transform(&Matrix::scaling(2.0, 3.0));
        assert_eq!(path.bounding_box(), Rect::new(0.0, 0.0, 2.0, 3.0));
    }

    #[test]
    fn test_to_skia() {
        let mut path = Path::new();
        path.append_point(Point::new(0.0, 0.0), PointKind::Move);
        path.append_point(Point::new(5.0, 5.0), PointKind::Bezier);
        path.append_point(Point::new(10.0, 5.0), PointKind::Bezier);
        path.append_point(Point::new(10.0, 0.0), PointKind::Bezier);
        path.close_figure();
        let skia = path.to_skia(None).unwrap();
        assert_eq!(skia.bounds().right(), 10.0);
        assert!(Path::new().to_skia(None).is_none());
    }

    #[test]
    fn test_closed_dot_stays_open() {
        let mut path = Path::new();
        path.append_point(Point::new(5.0, 5.0), PointKind::Move);
        path.append_point(Point::new(5.0, 5.0), PointKind::Line);
        path.close_figure();
        let skia = path.to_skia(None).unwrap();
        assert!(!skia.segments().any(|s| matches!(s, tiny_skia::PathSegment::Close)));
    }
}
