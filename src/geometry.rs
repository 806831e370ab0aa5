//! Geometry values decoded from a serialized tree.
//!
//! Every value here is a small `Copy` type. Decoding a geometry never allocates, and a decoded
//! value can be retained for as long as the caller likes, independent of the buffer it came from.

use std::fmt;

use geo_traits::{
    CoordTrait, GeometryTrait, GeometryType, RectTrait, UnimplementedGeometryCollection,
    UnimplementedLine, UnimplementedLineString, UnimplementedMultiLineString,
    UnimplementedMultiPoint, UnimplementedMultiPolygon, UnimplementedPoint, UnimplementedPolygon,
    UnimplementedTriangle,
};

use crate::r#type::IndexableNum;

/// The capability set shared by every spatial shape stored in a tree.
pub trait Shape<N: IndexableNum> {
    /// The minimum bounding rectangle of this shape.
    fn mbr(&self) -> Rectangle<N>;

    /// Euclidean distance from this shape to `rect`, computed in `f64`.
    ///
    /// This is never negative, and is zero exactly when the shape intersects `rect`.
    fn distance(&self, rect: &Rectangle<N>) -> f64;

    /// Returns `true` if this shape touches or overlaps `rect`.
    fn intersects(&self, rect: &Rectangle<N>) -> bool {
        self.distance(rect) == 0.0
    }
}

/// An axis-aligned rectangle. Also used as the bounding box of every node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle<N: IndexableNum> {
    pub min_x: N,
    pub min_y: N,
    pub max_x: N,
    pub max_y: N,
}

impl<N: IndexableNum> Rectangle<N> {
    /// Create a new rectangle. `min_x <= max_x` and `min_y <= max_y` must hold.
    pub fn new(min_x: N, min_y: N, max_x: N, max_y: N) -> Self {
        debug_assert!(min_x <= max_x, "min_x must not exceed max_x");
        debug_assert!(min_y <= max_y, "min_y must not exceed max_y");
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Copy any [`RectTrait`] implementation into a `Rectangle`. Corners given in the wrong
    /// order are swapped.
    pub fn from_rect(rect: &impl RectTrait<T = N>) -> Self {
        let (min, max) = (rect.min(), rect.max());
        Self {
            min_x: partial_min(min.x(), max.x()),
            min_y: partial_min(min.y(), max.y()),
            max_x: partial_max(min.x(), max.x()),
            max_y: partial_max(min.y(), max.y()),
        }
    }

    /// The smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: partial_min(self.min_x, other.min_x),
            min_y: partial_min(self.min_y, other.min_y),
            max_x: partial_max(self.max_x, other.max_x),
            max_y: partial_max(self.max_y, other.max_y),
        }
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    pub fn width(&self) -> f64 {
        to_f64(self.max_x) - to_f64(self.min_x)
    }

    pub fn height(&self) -> f64 {
        to_f64(self.max_y) - to_f64(self.min_y)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

impl<N: IndexableNum> Shape<N> for Rectangle<N> {
    fn mbr(&self) -> Rectangle<N> {
        *self
    }

    fn distance(&self, rect: &Rectangle<N>) -> f64 {
        let dx = axis_gap(self.min_x, self.max_x, rect.min_x, rect.max_x);
        let dy = axis_gap(self.min_y, self.max_y, rect.min_y, rect.max_y);
        dx.hypot(dy)
    }

    fn intersects(&self, rect: &Rectangle<N>) -> bool {
        if self.max_x < rect.min_x {
            return false;
        }
        if self.max_y < rect.min_y {
            return false;
        }
        if self.min_x > rect.max_x {
            return false;
        }
        if self.min_y > rect.max_y {
            return false;
        }
        true
    }
}

impl<N: IndexableNum> fmt::Display for Rectangle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rectangle [x1={:?}, y1={:?}, x2={:?}, y2={:?}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// A single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point<N: IndexableNum> {
    pub x: N,
    pub y: N,
}

impl<N: IndexableNum> Point<N> {
    pub fn new(x: N, y: N) -> Self {
        Self { x, y }
    }
}

impl<N: IndexableNum> Shape<N> for Point<N> {
    fn mbr(&self) -> Rectangle<N> {
        Rectangle {
            min_x: self.x,
            min_y: self.y,
            max_x: self.x,
            max_y: self.y,
        }
    }

    fn distance(&self, rect: &Rectangle<N>) -> f64 {
        self.mbr().distance(rect)
    }

    fn intersects(&self, rect: &Rectangle<N>) -> bool {
        self.x >= rect.min_x && self.x <= rect.max_x && self.y >= rect.min_y && self.y <= rect.max_y
    }
}

impl<N: IndexableNum> fmt::Display for Point<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point [x={:?}, y={:?}]", self.x, self.y)
    }
}

/// The closed set of geometries that can be stored in a serialized tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry<N: IndexableNum> {
    Rectangle(Rectangle<N>),
    Point(Point<N>),
}

impl<N: IndexableNum> Geometry<N> {
    pub fn as_rectangle(&self) -> Option<&Rectangle<N>> {
        match self {
            Self::Rectangle(rect) => Some(rect),
            Self::Point(_) => None,
        }
    }

    pub fn as_point(&self) -> Option<&Point<N>> {
        match self {
            Self::Rectangle(_) => None,
            Self::Point(point) => Some(point),
        }
    }
}

impl<N: IndexableNum> Shape<N> for Geometry<N> {
    fn mbr(&self) -> Rectangle<N> {
        match self {
            Self::Rectangle(rect) => rect.mbr(),
            Self::Point(point) => point.mbr(),
        }
    }

    fn distance(&self, rect: &Rectangle<N>) -> f64 {
        match self {
            Self::Rectangle(r) => r.distance(rect),
            Self::Point(point) => point.distance(rect),
        }
    }

    fn intersects(&self, rect: &Rectangle<N>) -> bool {
        match self {
            Self::Rectangle(r) => r.intersects(rect),
            Self::Point(point) => point.intersects(rect),
        }
    }
}

impl<N: IndexableNum> From<Rectangle<N>> for Geometry<N> {
    fn from(value: Rectangle<N>) -> Self {
        Self::Rectangle(value)
    }
}

impl<N: IndexableNum> From<Point<N>> for Geometry<N> {
    fn from(value: Point<N>) -> Self {
        Self::Point(value)
    }
}

impl<N: IndexableNum> fmt::Display for Geometry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rectangle(rect) => fmt::Display::fmt(rect, f),
            Self::Point(point) => fmt::Display::fmt(point, f),
        }
    }
}

impl<N: IndexableNum> CoordTrait for Point<N> {
    type T = N;

    fn dim(&self) -> geo_traits::Dimensions {
        geo_traits::Dimensions::Xy
    }

    fn x(&self) -> Self::T {
        self.x
    }

    fn y(&self) -> Self::T {
        self.y
    }

    fn nth_or_panic(&self, n: usize) -> Self::T {
        match n {
            0 => self.x,
            1 => self.y,
            _ => panic!("Invalid index of coord"),
        }
    }
}

impl<N: IndexableNum> GeometryTrait for Rectangle<N> {
    type T = N;
    type PointType<'b>
        = UnimplementedPoint<N>
    where
        Self: 'b;
    type LineStringType<'b>
        = UnimplementedLineString<N>
    where
        Self: 'b;
    type PolygonType<'b>
        = UnimplementedPolygon<N>
    where
        Self: 'b;
    type MultiPointType<'b>
        = UnimplementedMultiPoint<N>
    where
        Self: 'b;
    type MultiLineStringType<'b>
        = UnimplementedMultiLineString<N>
    where
        Self: 'b;
    type MultiPolygonType<'b>
        = UnimplementedMultiPolygon<N>
    where
        Self: 'b;
    type GeometryCollectionType<'b>
        = UnimplementedGeometryCollection<N>
    where
        Self: 'b;
    type RectType<'b>
        = Rectangle<N>
    where
        Self: 'b;
    type TriangleType<'b>
        = UnimplementedTriangle<N>
    where
        Self: 'b;
    type LineType<'b>
        = UnimplementedLine<N>
    where
        Self: 'b;

    fn dim(&self) -> geo_traits::Dimensions {
        geo_traits::Dimensions::Xy
    }

    fn as_type(
        &self,
    ) -> GeometryType<
        '_,
        UnimplementedPoint<N>,
        UnimplementedLineString<N>,
        UnimplementedPolygon<N>,
        UnimplementedMultiPoint<N>,
        UnimplementedMultiLineString<N>,
        UnimplementedMultiPolygon<N>,
        UnimplementedGeometryCollection<N>,
        Rectangle<N>,
        UnimplementedTriangle<N>,
        UnimplementedLine<N>,
    > {
        GeometryType::Rect(self)
    }
}

impl<N: IndexableNum> RectTrait for Rectangle<N> {
    type CoordType<'a>
        = Point<N>
    where
        Self: 'a;

    fn min(&self) -> Self::CoordType<'_> {
        Point::new(self.min_x, self.min_y)
    }

    fn max(&self) -> Self::CoordType<'_> {
        Point::new(self.max_x, self.max_y)
    }
}

#[cfg(feature = "use-geo_0_31")]
mod geo_interop {
    use super::{Geometry, Point, Rectangle};

    impl From<Rectangle<f64>> for geo_0_31::Rect<f64> {
        fn from(value: Rectangle<f64>) -> Self {
            geo_0_31::Rect::new(
                geo_0_31::Coord {
                    x: value.min_x,
                    y: value.min_y,
                },
                geo_0_31::Coord {
                    x: value.max_x,
                    y: value.max_y,
                },
            )
        }
    }

    impl From<Point<f64>> for geo_0_31::Point<f64> {
        fn from(value: Point<f64>) -> Self {
            geo_0_31::Point::new(value.x, value.y)
        }
    }

    impl From<Geometry<f64>> for geo_0_31::Geometry<f64> {
        fn from(value: Geometry<f64>) -> Self {
            match value {
                Geometry::Rectangle(rect) => geo_0_31::Geometry::Rect(rect.into()),
                Geometry::Point(point) => geo_0_31::Geometry::Point(point.into()),
            }
        }
    }

}

#[inline]
fn to_f64<N: IndexableNum>(value: N) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Gap between two closed intervals on one axis, zero when they overlap.
#[inline]
fn axis_gap<N: IndexableNum>(a_min: N, a_max: N, b_min: N, b_max: N) -> f64 {
    if a_max < b_min {
        to_f64(b_min) - to_f64(a_max)
    } else if b_max < a_min {
        to_f64(a_min) - to_f64(b_max)
    } else {
        0.0
    }
}

#[inline]
fn partial_min<N: IndexableNum>(a: N, b: N) -> N {
    if b < a {
        b
    } else {
        a
    }
}

#[inline]
fn partial_max<N: IndexableNum>(a: N, b: N) -> N {
    if b > a {
        b
    } else {
        a
    }
}
