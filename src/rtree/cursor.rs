//! Position-addressed, read-only views over the records of a serialized tree.
//!
//! A cursor is a buffer reference plus a byte offset. It is repositioned in place to decode
//! successive records, so walking a tree never copies bytes or allocates. Every `reposition`
//! validates the record it lands on; once it succeeds, the accessors are infallible.
//!
//! Anything read through a cursor is stale as soon as the cursor is repositioned. Values that
//! need to outlive a decode step are copied out through [`crate::rtree::decode`].

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::{pod_read_unaligned, Pod};

use crate::error::{RTreeError, Result};
use crate::geometry::Rectangle;
use crate::r#type::IndexableNum;
use crate::rtree::constants::{GEOMETRY_TYPE_BOX, GEOMETRY_TYPE_POINT, OFFSET_BYTE_LENGTH};
use crate::rtree::decode::decode_box;

/// Borrow `len` bytes at `pos`, failing if the buffer is too short.
#[inline]
pub(crate) fn slice_at(data: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or(RTreeError::OutOfBounds {
            offset: pos,
            len,
            buffer_len: data.len(),
        })
}

/// Read a `T` at `pos`, failing if the buffer is too short. No alignment is required.
#[inline]
pub(crate) fn read_at<T: Pod>(data: &[u8], pos: usize) -> Result<T> {
    slice_at(data, pos, size_of::<T>()).map(pod_read_unaligned)
}

/// Read a `T` at a position that an earlier `reposition` already bounds-checked.
#[inline]
fn read_validated<T: Pod>(data: &[u8], pos: usize) -> T {
    pod_read_unaligned(&data[pos..pos + size_of::<T>()])
}

#[inline]
pub(crate) fn box_byte_length<N: IndexableNum>() -> usize {
    4 * N::BYTES_PER_ELEMENT
}

/// Byte length of the fixed part of a node record: mbb plus both counts.
#[inline]
pub(crate) fn node_header_byte_length<N: IndexableNum>() -> usize {
    box_byte_length::<N>() + 2 * OFFSET_BYTE_LENGTH
}

/// The discriminant of a stored geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Box,
    Point,
}

impl GeometryType {
    /// Map a stored tag onto a geometry type. `offset` is only used for error reporting.
    pub fn from_tag(tag: u8, offset: usize) -> Result<Self> {
        match tag {
            GEOMETRY_TYPE_BOX => Ok(Self::Box),
            GEOMETRY_TYPE_POINT => Ok(Self::Point),
            tag => Err(RTreeError::UnsupportedGeometryType { tag, offset }),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::Box => GEOMETRY_TYPE_BOX,
            Self::Point => GEOMETRY_TYPE_POINT,
        }
    }

    /// Byte length of the coordinates following the tag.
    pub fn coords_byte_length<N: IndexableNum>(self) -> usize {
        match self {
            Self::Box => 4 * N::BYTES_PER_ELEMENT,
            Self::Point => 2 * N::BYTES_PER_ELEMENT,
        }
    }
}

/// A cursor over four stored scalars: `min_x, min_y, max_x, max_y`.
#[derive(Debug, Clone, Copy)]
pub struct BoxCursor<'a, N: IndexableNum> {
    data: &'a [u8],
    pos: usize,
    phantom: PhantomData<N>,
}

impl<'a, N: IndexableNum> BoxCursor<'a, N> {
    /// Create an unpositioned cursor over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            phantom: PhantomData,
        }
    }

    pub fn reposition(&mut self, pos: usize) -> Result<()> {
        slice_at(self.data, pos, box_byte_length::<N>())?;
        self.pos = pos;
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn min_x(&self) -> N {
        read_validated(self.data, self.pos)
    }

    #[inline]
    pub fn min_y(&self) -> N {
        read_validated(self.data, self.pos + N::BYTES_PER_ELEMENT)
    }

    #[inline]
    pub fn max_x(&self) -> N {
        read_validated(self.data, self.pos + 2 * N::BYTES_PER_ELEMENT)
    }

    #[inline]
    pub fn max_y(&self) -> N {
        read_validated(self.data, self.pos + 3 * N::BYTES_PER_ELEMENT)
    }
}

/// A cursor over one node record.
///
/// A node record is its bounding box, a `u32` children count, a `u32` entries count, and then one
/// `u32` offset per child followed by one `u32` offset per entry. Child and entry access is a
/// single table lookup.
#[derive(Debug, Clone, Copy)]
pub struct NodeCursor<'a, N: IndexableNum> {
    data: &'a [u8],
    pos: usize,
    children_len: u32,
    entries_len: u32,
    phantom: PhantomData<N>,
}

impl<'a, N: IndexableNum> NodeCursor<'a, N> {
    /// Create an unpositioned cursor over `data`. It reports no children and no entries until it
    /// is repositioned onto a node.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            children_len: 0,
            entries_len: 0,
            phantom: PhantomData,
        }
    }

    /// Create a cursor positioned on the node record at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        let mut cursor = Self::new(data);
        cursor.reposition(pos)?;
        Ok(cursor)
    }

    /// Move this cursor onto the node record at `pos`.
    ///
    /// Fails with [`RTreeError::MalformedNode`] unless exactly one of the two counts is positive.
    /// On failure the cursor keeps its previous position.
    pub fn reposition(&mut self, pos: usize) -> Result<()> {
        slice_at(self.data, pos, node_header_byte_length::<N>())?;
        let counts_pos = pos + box_byte_length::<N>();
        let children_len: u32 = read_validated(self.data, counts_pos);
        let entries_len: u32 = read_validated(self.data, counts_pos + OFFSET_BYTE_LENGTH);

        if (children_len == 0) == (entries_len == 0) {
            return Err(RTreeError::MalformedNode { offset: pos });
        }

        let table_pos = pos + node_header_byte_length::<N>();
        let table_len = (children_len as usize)
            .checked_add(entries_len as usize)
            .and_then(|slots| slots.checked_mul(OFFSET_BYTE_LENGTH))
            .ok_or(RTreeError::OutOfBounds {
                offset: table_pos,
                len: usize::MAX,
                buffer_len: self.data.len(),
            })?;
        slice_at(self.data, table_pos, table_len)?;

        self.pos = pos;
        self.children_len = children_len;
        self.entries_len = entries_len;
        Ok(())
    }

    /// The byte offset of this node record.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// The buffer this cursor reads from.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Point `out` at this node's bounding box.
    #[inline]
    pub fn mbb(&self, out: &mut BoxCursor<'a, N>) {
        out.data = self.data;
        out.pos = self.pos;
    }

    /// Copy this node's bounding box out of the buffer.
    pub fn mbb_rect(&self) -> Rectangle<N> {
        let mut cursor = BoxCursor::new(self.data);
        self.mbb(&mut cursor);
        decode_box(&cursor)
    }

    #[inline]
    pub fn children_count(&self) -> usize {
        self.children_len as usize
    }

    #[inline]
    pub fn entries_count(&self) -> usize {
        self.entries_len as usize
    }

    /// Returns `true` if this node holds entries rather than children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children_len == 0
    }

    #[inline]
    fn table_pos(&self) -> usize {
        self.pos + node_header_byte_length::<N>()
    }

    /// The byte offset of the `i`th child node.
    ///
    /// Children are always stored before their parent, so a child offset at or past this node's
    /// own offset is reported as a malformed node. This also rules out cycles.
    pub fn child_offset(&self, i: usize) -> Result<usize> {
        if i >= self.children_count() {
            return Err(RTreeError::IndexOutOfRange {
                index: i,
                count: self.children_count(),
            });
        }
        let offset: u32 = read_validated(self.data, self.table_pos() + i * OFFSET_BYTE_LENGTH);
        let offset = offset as usize;
        if offset >= self.pos {
            return Err(RTreeError::MalformedNode { offset: self.pos });
        }
        Ok(offset)
    }

    /// Reposition `out` onto the `i`th child node.
    #[inline]
    pub fn child(&self, i: usize, out: &mut NodeCursor<'a, N>) -> Result<()> {
        out.reposition(self.child_offset(i)?)
    }

    /// The byte offset of the `i`th entry record.
    pub fn entry_offset(&self, i: usize) -> Result<usize> {
        if i >= self.entries_count() {
            return Err(RTreeError::IndexOutOfRange {
                index: i,
                count: self.entries_count(),
            });
        }
        let slot = self.children_count() + i;
        let offset: u32 = read_validated(self.data, self.table_pos() + slot * OFFSET_BYTE_LENGTH);
        Ok(offset as usize)
    }

    /// Reposition `out` onto the `i`th entry record.
    #[inline]
    pub fn entry(&self, i: usize, out: &mut EntryCursor<'a, N>) -> Result<()> {
        out.reposition(self.entry_offset(i)?)
    }
}

/// A cursor over a stored geometry: a one byte tag followed by its coordinates.
#[derive(Debug, Clone, Copy)]
pub struct GeometryCursor<'a, N: IndexableNum> {
    data: &'a [u8],
    pos: usize,
    geometry_type: GeometryType,
    phantom: PhantomData<N>,
}

impl<'a, N: IndexableNum> GeometryCursor<'a, N> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            geometry_type: GeometryType::Point,
            phantom: PhantomData,
        }
    }

    /// Move onto the geometry at `pos`. An unknown tag fails with
    /// [`RTreeError::UnsupportedGeometryType`].
    pub fn reposition(&mut self, pos: usize) -> Result<()> {
        let tag: u8 = read_at(self.data, pos)?;
        let geometry_type = GeometryType::from_tag(tag, pos)?;
        slice_at(self.data, pos + 1, geometry_type.coords_byte_length::<N>())?;
        self.pos = pos;
        self.geometry_type = geometry_type;
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    /// Byte length of the tag plus coordinates.
    pub fn byte_length(&self) -> usize {
        1 + self.geometry_type.coords_byte_length::<N>()
    }

    /// Point `out` at the coordinates of a box geometry.
    pub fn box_coords(&self, out: &mut BoxCursor<'a, N>) {
        debug_assert_eq!(self.geometry_type, GeometryType::Box);
        out.data = self.data;
        out.pos = self.pos + 1;
    }

    pub fn point_x(&self) -> N {
        debug_assert_eq!(self.geometry_type, GeometryType::Point);
        read_validated(self.data, self.pos + 1)
    }

    pub fn point_y(&self) -> N {
        debug_assert_eq!(self.geometry_type, GeometryType::Point);
        read_validated(self.data, self.pos + 1 + N::BYTES_PER_ELEMENT)
    }
}

/// A cursor over an entry record: a geometry, a `u32` payload length, and the payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct EntryCursor<'a, N: IndexableNum> {
    data: &'a [u8],
    pos: usize,
    payload_pos: usize,
    payload_len: usize,
    phantom: PhantomData<N>,
}

impl<'a, N: IndexableNum> EntryCursor<'a, N> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            payload_pos: 0,
            payload_len: 0,
            phantom: PhantomData,
        }
    }

    /// Move onto the entry record at `pos`, validating its geometry tag and payload extent.
    pub fn reposition(&mut self, pos: usize) -> Result<()> {
        let tag: u8 = read_at(self.data, pos)?;
        let geometry_type = GeometryType::from_tag(tag, pos)?;
        let len_pos = pos + 1 + geometry_type.coords_byte_length::<N>();
        let payload_len: u32 = read_at(self.data, len_pos)?;
        let payload_pos = len_pos + OFFSET_BYTE_LENGTH;
        slice_at(self.data, payload_pos, payload_len as usize)?;

        self.pos = pos;
        self.payload_pos = payload_pos;
        self.payload_len = payload_len as usize;
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Reposition `out` onto this entry's geometry.
    #[inline]
    pub fn geometry(&self, out: &mut GeometryCursor<'a, N>) -> Result<()> {
        out.reposition(self.pos)
    }

    /// The payload bytes. The slice borrows the tree buffer, not this cursor.
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.payload_pos..self.payload_pos + self.payload_len]
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }
}
