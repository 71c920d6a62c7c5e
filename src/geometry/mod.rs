//! Geometric primitives shared by the interpreter and the compositor.
//!
//! Rectangles follow PDF conventions: `bottom <= top` in user space, with
//! the y axis pointing up. [`IntRect`] is the device-space counterpart with
//! the y axis pointing down.

use serde::Serialize;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::geometry::Point;
    ///
    /// let point = Point::new(10.0, 20.0);
    /// assert_eq!(point.x, 10.0);
    /// assert_eq!(point.y, 20.0);
    /// ```
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    /// Minimum x
    pub left: f32,
    /// Minimum y
    pub bottom: f32,
    /// Maximum x
    pub right: f32,
    /// Maximum y
    pub top: f32,
}

impl Rect {
    /// Create a rectangle from its edges.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::geometry::Rect;
    ///
    /// let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
    /// assert_eq!(rect.width(), 100.0);
    /// assert_eq!(rect.height(), 50.0);
    /// ```
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Build a normalized rectangle from two corners in any order.
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Read a rectangle from a 4-number PDF array.
    pub fn from_array(values: &[f32]) -> Option<Self> {
        match values {
            [x0, y0, x1, y1, ..] => Some(Self::from_points(*x0, *y0, *x1, *y1)),
            _ => None,
        }
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// True when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.bottom >= self.top
    }

    /// Swap edges so that `left <= right` and `bottom <= top`.
    pub fn normalize(&mut self) {
        if self.left > self.right {
            std::mem::swap(&mut self.left, &mut self.right);
        }
        if self.bottom > self.top {
            std::mem::swap(&mut self.bottom, &mut self.top);
        }
    }

    /// Intersection of two rectangles, empty when they do not overlap.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::geometry::Rect;
    ///
    /// let a = Rect::new(0.0, 0.0, 100.0, 100.0);
    /// let b = Rect::new(50.0, 50.0, 150.0, 150.0);
    /// assert_eq!(a.intersect(&b), Rect::new(50.0, 50.0, 100.0, 100.0));
    /// ```
    pub fn intersect(&self, other: &Rect) -> Rect {
        let left = self.left.max(other.left);
        let bottom = self.bottom.max(other.bottom);
        let right = self.right.min(other.right);
        let top = self.top.min(other.top);
        if left > right || bottom > top {
            return Rect::default();
        }
        Rect::new(left, bottom, right, top)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.bottom.min(other.bottom),
            self.right.max(other.right),
            self.top.max(other.top),
        )
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.bottom >= self.bottom
            && other.top <= self.top
    }

    /// True when the point lies inside or on the edge.
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }

    /// True when the two rectangles share any point.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left <= other.right
            && self.right >= other.left
            && self.bottom <= other.top
            && self.top >= other.bottom
    }

    /// Grow the rectangle by `dx`/`dy` on each side.
    pub fn inflate(&mut self, dx: f32, dy: f32) {
        self.left -= dx;
        self.right += dx;
        self.bottom -= dy;
        self.top += dy;
    }

    /// Smallest integer rectangle covering this one.
    pub fn outer(&self) -> IntRect {
        IntRect::new(
            self.left.floor() as i32,
            self.bottom.floor() as i32,
            self.right.ceil() as i32,
            self.top.ceil() as i32,
        )
    }

    /// Integer rectangle obtained by rounding each edge.
    pub fn round(&self) -> IntRect {
        IntRect::new(
            self.left.round() as i32,
            self.bottom.round() as i32,
            self.right.round() as i32,
            self.top.round() as i32,
        )
    }

    /// Extend the rectangle to cover `p`.
    pub fn update_point(&mut self, p: Point) {
        self.left = self.left.min(p.x);
        self.right = self.right.max(p.x);
        self.bottom = self.bottom.min(p.y);
        self.top = self.top.max(p.y);
    }
}

/// An integer rectangle in device space, `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IntRect {
    /// Minimum x
    pub left: i32,
    /// Minimum y
    pub top: i32,
    /// Maximum x (exclusive)
    pub right: i32,
    /// Maximum y (exclusive)
    pub bottom: i32,
}

impl IntRect {
    /// Create a rectangle, normalizing the edge order.
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    /// Create from origin and size.
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Width in pixels.
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    /// Height in pixels.
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True when the rectangle covers no pixel.
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Intersection, empty when disjoint.
    pub fn intersect(&self, other: &IntRect) -> IntRect {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);
        if left >= right || top >= bottom {
            return IntRect::default();
        }
        IntRect {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Float version of the rectangle, keeping device orientation.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
        )
    }
}

/// A 2D affine transformation matrix.
///
/// PDF uses matrices of the form:
/// ```text
/// [ a  b  0 ]
/// [ c  d  0 ]
/// [ e  f  1 ]
/// ```
///
/// Where (a,b,c,d) define scaling/rotation/skewing and (e,f) define translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Matrix {
    /// Horizontal scaling component
    pub a: f32,
    /// Rotation/skew component
    pub b: f32,
    /// Rotation/skew component
    pub c: f32,
    /// Vertical scaling component
    pub d: f32,
    /// Horizontal translation
    pub e: f32,
    /// Vertical translation
    pub f: f32,
}

impl Matrix {
    /// Create a matrix from its six components.
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Create an identity matrix.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::geometry::Matrix;
    ///
    /// let m = Matrix::identity();
    /// assert!(m.is_identity());
    /// ```
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Create a translation matrix.
    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Create a scaling matrix.
    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Read a matrix from a 6-number PDF array, identity when too short.
    pub fn from_array(values: &[f32]) -> Self {
        match values {
            [a, b, c, d, e, f, ..] => Self::new(*a, *b, *c, *d, *e, *f),
            _ => Self::identity(),
        }
    }

    /// True for the identity matrix.
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Compose two matrices: the result applies `self` first, then `other`.
    ///
    /// The PDF `cm` operator is therefore `new_ctm = m.multiply(&ctm)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_raster::geometry::Matrix;
    ///
    /// let scale = Matrix::scaling(2.0, 2.0);
    /// let shift = Matrix::translation(10.0, 0.0);
    /// let p = scale.multiply(&shift).transform_point(1.0, 1.0);
    /// assert_eq!((p.x, p.y), (12.0, 2.0));
    /// ```
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// In-place form of [`Matrix::multiply`].
    pub fn concat(&mut self, other: &Matrix) {
        *self = self.multiply(other);
    }

    /// Prepend `other`: the result applies `other` first, then `self`.
    pub fn pre_concat(&mut self, other: &Matrix) {
        *self = other.multiply(self);
    }

    /// Apply a translation after this matrix.
    pub fn translate(&mut self, tx: f32, ty: f32) {
        self.e += tx;
        self.f += ty;
    }

    /// Transform a point using this matrix.
    pub fn transform_point(&self, x: f32, y: f32) -> Point {
        Point {
            x: self.a * x + self.c * y + self.e,
            y: self.b * x + self.d * y + self.f,
        }
    }

    /// Transform a point value.
    pub fn transform(&self, p: Point) -> Point {
        self.transform_point(p.x, p.y)
    }

    /// Transform a distance; uses the average scale of both axes.
    pub fn transform_distance(&self, distance: f32) -> f32 {
        let x = self.a + self.c;
        let y = self.b + self.d;
        distance * (x * x + y * y).sqrt() / std::f32::consts::SQRT_2
    }

    /// Bounding box of a transformed rectangle.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.left, rect.bottom),
            self.transform_point(rect.left, rect.top),
            self.transform_point(rect.right, rect.bottom),
            self.transform_point(rect.right, rect.top),
        ];
        let mut out = Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
        for p in &corners[1..] {
            out.update_point(*p);
        }
        out
    }

    /// Get the determinant of this matrix.
    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Check if this matrix is invertible.
    pub fn is_invertible(&self) -> bool {
        self.determinant().abs() > f32::EPSILON
    }

    /// Inverse matrix, or identity when the matrix is singular.
    pub fn inverse(&self) -> Matrix {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON {
            return Matrix::identity();
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        }
    }

    /// Length of the transformed x unit vector.
    pub fn x_unit(&self) -> f32 {
        if self.b == 0.0 {
            return self.a.abs();
        }
        if self.a == 0.0 {
            return self.b.abs();
        }
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Length of the transformed y unit vector.
    pub fn y_unit(&self) -> f32 {
        if self.c == 0.0 {
            return self.d.abs();
        }
        if self.d == 0.0 {
            return self.c.abs();
        }
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// True when the matrix only scales and translates.
    pub fn is_scale_transform(&self) -> bool {
        self.b.abs() * 1000.0 < self.a.abs() && self.c.abs() * 1000.0 < self.d.abs()
    }

    /// The matrix mapping the unit square onto `rect`.
    pub fn from_unit_rect(rect: &Rect) -> Matrix {
        Matrix::new(rect.width(), 0.0, 0.0, rect.height(), rect.left, rect.bottom)
    }

    /// Convert to the rasterizer's transform type.
    pub fn to_skia(&self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_row(self.a, self.b, self.c, self.d, self.e, self.f)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}
