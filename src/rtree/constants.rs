//! Layout constants of the serialized tree format.

/// First byte of every serialized tree.
pub const RTREE_MAGIC: u8 = 0xfc;

/// Format version, stored in the high nibble of the second header byte.
pub const VERSION: u8 = 1; // serialized data format version

/// Byte length of the tree header.
pub const HEADER_BYTE_LENGTH: usize = 8;

/// Deepest tree a reader will walk, counting the root and the leaves.
pub const MAX_HEIGHT: u16 = 256;

/// Byte width of every count and offset field.
pub(crate) const OFFSET_BYTE_LENGTH: usize = 4;

/// Geometry tag of a box (rectangle) entry.
pub const GEOMETRY_TYPE_BOX: u8 = 0;

/// Geometry tag of a point entry.
pub const GEOMETRY_TYPE_POINT: u8 = 1;
