use std::fmt::Debug;

use num_traits::{Bounded, Num, NumCast, ToPrimitive};

use crate::error::RTreeError;
use crate::rtree::constants::RTREE_MAGIC;

/// A trait for types that can be used for stored coordinates.
///
/// This trait is sealed and cannot be implemented for external types. The type index is written
/// into the buffer header, so the set of scalar types is part of the binary format.
pub trait IndexableNum:
    private::Sealed
    + Num
    + NumCast
    + ToPrimitive
    + PartialOrd
    + Debug
    + Send
    + Sync
    + bytemuck::Pod
    + Bounded
{
    /// The type index stored in the low nibble of the second header byte
    const TYPE_INDEX: u8;
    /// The number of bytes per element
    const BYTES_PER_ELEMENT: usize;
}

impl IndexableNum for i8 {
    const TYPE_INDEX: u8 = 0;
    const BYTES_PER_ELEMENT: usize = 1;
}

impl IndexableNum for u8 {
    const TYPE_INDEX: u8 = 1;
    const BYTES_PER_ELEMENT: usize = 1;
}

impl IndexableNum for i16 {
    const TYPE_INDEX: u8 = 3;
    const BYTES_PER_ELEMENT: usize = 2;
}

impl IndexableNum for u16 {
    const TYPE_INDEX: u8 = 4;
    const BYTES_PER_ELEMENT: usize = 2;
}

impl IndexableNum for i32 {
    const TYPE_INDEX: u8 = 5;
    const BYTES_PER_ELEMENT: usize = 4;
}

impl IndexableNum for u32 {
    const TYPE_INDEX: u8 = 6;
    const BYTES_PER_ELEMENT: usize = 4;
}

impl IndexableNum for f32 {
    const TYPE_INDEX: u8 = 7;
    const BYTES_PER_ELEMENT: usize = 4;
}

impl IndexableNum for f64 {
    const TYPE_INDEX: u8 = 8;
    const BYTES_PER_ELEMENT: usize = 8;
}

/// An enum over the allowed coordinate types in a serialized tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl CoordType {
    /// Infer the CoordType from an existing buffer.
    ///
    /// This can be used to discern the generic type to use when constructing a
    /// [`SerializedRTree`][crate::rtree::SerializedRTree] over a buffer of unknown origin.
    pub fn from_buffer<T: AsRef<[u8]>>(data: &T) -> Result<Self, RTreeError> {
        let data = data.as_ref();
        if data.len() < 2 {
            return Err(RTreeError::General(
                "Buffer too short to hold a tree header.".to_string(),
            ));
        }

        let magic = data[0];
        if magic != RTREE_MAGIC {
            return Err(RTreeError::General(
                "Data not in serialized rtree format.".to_string(),
            ));
        }

        let version_and_type = data[1];
        let type_ = version_and_type & 0x0f;
        let result = match type_ {
            i8::TYPE_INDEX => CoordType::Int8,
            u8::TYPE_INDEX => CoordType::UInt8,
            i16::TYPE_INDEX => CoordType::Int16,
            u16::TYPE_INDEX => CoordType::UInt16,
            i32::TYPE_INDEX => CoordType::Int32,
            u32::TYPE_INDEX => CoordType::UInt32,
            f32::TYPE_INDEX => CoordType::Float32,
            f64::TYPE_INDEX => CoordType::Float64,
            t => return Err(RTreeError::General(format!("Unexpected type {}.", t))),
        };
        Ok(result)
    }
}

// https://rust-lang.github.io/api-guidelines/future-proofing.html#sealed-traits-protect-against-downstream-implementations-c-sealed
mod private {
    pub trait Sealed {}

    impl Sealed for i8 {}
    impl Sealed for u8 {}
    impl Sealed for i16 {}
    impl Sealed for u16 {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}
