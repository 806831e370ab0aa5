//! Conversion from cursors into owned geometry values and borrowed payloads.
//!
//! None of these functions allocate. The returned [`Geometry`] is a `Copy` value, so it can be
//! handed to criteria and stored in result entries while the cursors move on.

use std::convert::Infallible;
use std::str::Utf8Error;

use crate::geometry::{Geometry, Point, Rectangle};
use crate::r#type::IndexableNum;
use crate::rtree::cursor::{BoxCursor, EntryCursor, GeometryCursor, GeometryType};

/// Read the four scalars under `cursor` into a [`Rectangle`].
#[inline]
pub fn decode_box<N: IndexableNum>(cursor: &BoxCursor<'_, N>) -> Rectangle<N> {
    // Stored boxes are taken as-is; ordering of the corners is the writer's responsibility.
    Rectangle {
        min_x: cursor.min_x(),
        min_y: cursor.min_y(),
        max_x: cursor.max_x(),
        max_y: cursor.max_y(),
    }
}

/// Decode the geometry under `cursor`, using `scratch` to read box coordinates.
///
/// The tag was checked when `cursor` was positioned, so unknown geometry types have already been
/// reported as [`RTreeError::UnsupportedGeometryType`][crate::RTreeError::UnsupportedGeometryType].
#[inline]
pub fn decode_geometry<'a, N: IndexableNum>(
    cursor: &GeometryCursor<'a, N>,
    scratch: &mut BoxCursor<'a, N>,
) -> Geometry<N> {
    match cursor.geometry_type() {
        GeometryType::Box => {
            cursor.box_coords(scratch);
            Geometry::Rectangle(decode_box(scratch))
        }
        GeometryType::Point => Geometry::Point(Point::new(cursor.point_x(), cursor.point_y())),
    }
}

/// The exact payload bytes of the entry under `cursor`, without copying.
#[inline]
pub fn decode_payload<'a, N: IndexableNum>(cursor: &EntryCursor<'a, N>) -> &'a [u8] {
    cursor.payload()
}

/// A payload deserializer that copies the raw bytes.
pub fn copy_payload(bytes: &[u8]) -> Result<Vec<u8>, Infallible> {
    Ok(bytes.to_vec())
}

/// A payload deserializer for UTF-8 text payloads.
pub fn utf8_payload(bytes: &[u8]) -> Result<String, Utf8Error> {
    std::str::from_utf8(bytes).map(str::to_string)
}
